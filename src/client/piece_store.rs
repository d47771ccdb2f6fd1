use bit_vec::BitVec;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::Error;

/// Local possession record for every piece of the shared file.
///
/// The bitfield lives inside a watch channel: each mutation happens under the
/// channel's lock and wakes anyone waiting on completion. Clones share state.
#[derive(Clone)]
pub struct PieceStore {
    state: Arc<watch::Sender<BitVec>>,
    total: u32,
}

impl PieceStore {
    pub fn new(total_pieces: u32) -> PieceStore {
        let (sender, _) = watch::channel(BitVec::from_elem(total_pieces as usize, false));
        PieceStore {
            state: Arc::new(sender),
            total: total_pieces,
        }
    }

    pub fn total_pieces(&self) -> u32 {
        self.total
    }

    fn check(&self, index: u32) -> Result<usize, Error> {
        if index < self.total {
            Ok(index as usize)
        } else {
            Err(Error::OutOfRange {
                index,
                total: self.total,
            })
        }
    }

    pub fn has(&self, index: u32) -> Result<bool, Error> {
        let index = self.check(index)?;
        Ok(self.state.borrow()[index])
    }

    /// Marks a piece as owned. Returns whether this call changed anything.
    pub fn mark_owned(&self, index: u32) -> Result<bool, Error> {
        let index = self.check(index)?;
        Ok(self.state.send_if_modified(|bits| {
            if bits[index] {
                false
            } else {
                bits.set(index, true);
                true
            }
        }))
    }

    pub fn is_complete(&self) -> bool {
        self.state.borrow().all()
    }

    /// Indices not yet owned, in increasing order.
    pub fn missing(&self) -> Vec<u32> {
        self.state
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, owned)| !owned)
            .map(|(index, _)| index as u32)
            .collect()
    }

    pub fn owned_count(&self) -> usize {
        self.state.borrow().iter().filter(|owned| *owned).count()
    }

    /// Suspends until every piece is owned.
    pub async fn wait_complete(&self) {
        let mut receiver = self.state.subscribe();
        // the sender lives as long as `self`, so this cannot observe a closed channel
        let _ = receiver.wait_for(|bits| bits.all()).await;
    }
}
