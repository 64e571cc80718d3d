// ── Hierarchy change deltas ──
//
// Connectors react to hierarchy changes record-by-record (the
// initialize/notify/remove hooks), so raw snapshots are the wrong
// granularity for them. A `ChangeStream` diffs each published
// generation against the one the subscriber last saw and yields the
// records that appeared and the ids that went away.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use super::Record;

/// One generation step of a repository.
#[derive(Debug, Clone)]
pub struct ChangeSet<T> {
    /// The full new snapshot the delta was computed against.
    pub snapshot: Arc<Vec<Arc<T>>>,
    /// Records present now that were absent in the prior generation.
    /// An upserted record with an unchanged id does not reappear here.
    pub added: Vec<Arc<T>>,
    /// Ids present in the prior generation and gone now.
    pub removed: Vec<Uuid>,
}

impl<T> ChangeSet<T> {
    /// Whether the generation step changed membership at all.
    pub fn is_membership_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Stream of [`ChangeSet`]s for one repository.
///
/// The baseline is the snapshot current at subscription time; only
/// generations published afterwards are yielded. Ends when the
/// repository is dropped.
pub struct ChangeStream<T: Record> {
    inner: WatchStream<Arc<Vec<Arc<T>>>>,
    seen: HashSet<Uuid>,
}

impl<T: Record> ChangeStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Vec<Arc<T>>>>) -> Self {
        let seen = receiver.borrow().iter().map(|r| r.id()).collect();
        Self {
            inner: WatchStream::from_changes(receiver),
            seen,
        }
    }

    /// Wait for the next published generation.
    pub async fn next_change(&mut self) -> Option<ChangeSet<T>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }
}

impl<T: Record> Stream for ChangeStream<T> {
    type Item = ChangeSet<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // All fields are Unpin; WatchStream is Unpin for Unpin items.
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(snapshot)) => {
                let current: HashSet<Uuid> = snapshot.iter().map(|r| r.id()).collect();
                let added = snapshot
                    .iter()
                    .filter(|r| !this.seen.contains(&r.id()))
                    .map(Arc::clone)
                    .collect();
                let removed = this
                    .seen
                    .iter()
                    .filter(|id| !current.contains(id))
                    .copied()
                    .collect();
                this.seen = current;
                Poll::Ready(Some(ChangeSet {
                    snapshot,
                    added,
                    removed,
                }))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::Repository;
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Node {
        id: Uuid,
        identifier: String,
    }

    impl Record for Node {
        fn id(&self) -> Uuid {
            self.id
        }
        fn identifier(&self) -> &str {
            &self.identifier
        }
        fn parent(&self) -> Option<Uuid> {
            None
        }
    }

    fn node(identifier: &str) -> Node {
        Node {
            id: Uuid::new_v4(),
            identifier: identifier.into(),
        }
    }

    #[test]
    fn append_yields_the_new_record_as_added() {
        tokio_test::block_on(async {
            let repo: Repository<Node> = Repository::new();
            repo.append(node("existing"));

            let mut changes = repo.changes();
            let added = node("fresh");
            repo.append(added.clone());

            let delta = changes.next_change().await.unwrap();
            assert_eq!(delta.snapshot.len(), 2);
            assert_eq!(delta.added.len(), 1);
            assert_eq!(delta.added[0].id, added.id);
            assert!(delta.removed.is_empty());
        });
    }

    #[test]
    fn replace_yields_one_delta_with_both_sides() {
        tokio_test::block_on(async {
            let repo: Repository<Node> = Repository::new();
            let old = node("old");
            repo.append(old.clone());

            let mut changes = repo.changes();
            let new = node("new");
            repo.replace(vec![new.clone()]);

            // One generation step: the swap never publishes an empty
            // intermediate snapshot.
            let delta = changes.next_change().await.unwrap();
            assert_eq!(delta.snapshot.len(), 1);
            assert_eq!(delta.added[0].id, new.id);
            assert_eq!(delta.removed, vec![old.id]);
        });
    }

    #[test]
    fn upsert_of_known_id_changes_no_membership() {
        tokio_test::block_on(async {
            let repo: Repository<Node> = Repository::new();
            let mut n = node("a");
            repo.append(n.clone());

            let mut changes = repo.changes();
            n.identifier = "renamed".into();
            repo.append(n);

            let delta = changes.next_change().await.unwrap();
            assert!(delta.is_membership_unchanged());
            assert_eq!(delta.snapshot.len(), 1);
        });
    }
}
