//! Previous/next lookup over a variant's instruction title list.
//!
//! Position in the list is the only ordering: there is no persisted ordinal.

use codestep_shared::InstructionTitle;
use tracing::error;

fn position_of(titles: &[InstructionTitle], instruction_id: &str, project_id: &str) -> Option<usize> {
    let index = titles.iter().position(|t| t.id == instruction_id);
    if index.is_none() {
        error!(
            instruction_id,
            project_id, "[projectsv2] Instruction id index not found"
        );
    }
    index
}

/// The title before `instruction_id`, or `None` at the start or when the id is
/// not in the list (logged).
pub fn find_previous_instruction<'a>(
    titles: &'a [InstructionTitle],
    instruction_id: &str,
    project_id: &str,
) -> Option<&'a InstructionTitle> {
    let index = position_of(titles, instruction_id, project_id)?;
    index.checked_sub(1).and_then(|i| titles.get(i))
}

/// The title after `instruction_id`, or `None` at the end or when the id is
/// not in the list (logged).
pub fn find_next_instruction<'a>(
    titles: &'a [InstructionTitle],
    instruction_id: &str,
    project_id: &str,
) -> Option<&'a InstructionTitle> {
    let index = position_of(titles, instruction_id, project_id)?;
    titles.get(index + 1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;

    fn titles(n: usize) -> Vec<InstructionTitle> {
        (0..n)
            .map(|i| InstructionTitle {
                id: format!("i{i}"),
                title: format!("Step {i}"),
            })
            .collect()
    }

    /// Counts ERROR-level events.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn count_errors(f: impl FnOnce()) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, f);
        count.load(Ordering::SeqCst)
    }

    #[test]
    fn neighbors_at_every_position() {
        for n in 1..=5 {
            let list = titles(n);
            for i in 0..n {
                let id = format!("i{i}");
                let prev = find_previous_instruction(&list, &id, "p");
                let next = find_next_instruction(&list, &id, "p");

                if i == 0 {
                    assert!(prev.is_none());
                } else {
                    assert_eq!(prev, Some(&list[i - 1]));
                }
                if i == n - 1 {
                    assert!(next.is_none());
                } else {
                    assert_eq!(next, Some(&list[i + 1]));
                }
            }
        }
    }

    #[test]
    fn absent_id_logs_once_per_lookup() {
        let list = titles(3);
        let errors = count_errors(|| {
            assert!(find_previous_instruction(&list, "missing", "p").is_none());
        });
        assert_eq!(errors, 1);

        let errors = count_errors(|| {
            assert!(find_next_instruction(&list, "missing", "p").is_none());
        });
        assert_eq!(errors, 1);
    }

    #[test]
    fn present_id_logs_nothing() {
        let list = titles(3);
        let errors = count_errors(|| {
            find_previous_instruction(&list, "i0", "p");
            find_next_instruction(&list, "i2", "p");
        });
        assert_eq!(errors, 0);
    }

    #[test]
    fn empty_list_has_no_neighbors() {
        let errors = count_errors(|| {
            assert!(find_previous_instruction(&[], "i0", "p").is_none());
            assert!(find_next_instruction(&[], "i0", "p").is_none());
        });
        assert_eq!(errors, 2);
    }
}
