use std::time::Duration;

use tracing::{debug, warn};

use super::BrowserSession;
use crate::error::ScrapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Growing { previous_height: u64 },
    Stable { height: u64 },
}

/// Outcome of [`ensure_page_loaded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stabilized {
    pub cycles: u32,
    pub height: u64,
    /// False when the cycle budget ran out while the page was still growing.
    pub reached_fixed_point: bool,
}

/// Scroll to the bottom and wait until the document height stops changing.
///
/// `max_cycles == 0` loops until the height settles, however long that takes.
pub async fn ensure_page_loaded<S>(
    session: &S,
    settle: Duration,
    max_cycles: u32,
) -> Result<Stabilized, ScrapeError>
where
    S: BrowserSession + ?Sized,
{
    let mut state = LoadState::Growing {
        previous_height: session.document_height().await?,
    };
    let mut cycles = 0u32;

    loop {
        match state {
            LoadState::Stable { height } => {
                debug!(cycles, height, "page height stable");
                return Ok(Stabilized {
                    cycles,
                    height,
                    reached_fixed_point: true,
                });
            }
            LoadState::Growing { previous_height } => {
                if max_cycles != 0 && cycles >= max_cycles {
                    warn!(
                        cycles,
                        height = previous_height,
                        "page still growing after scroll budget, continuing with loaded content"
                    );
                    return Ok(Stabilized {
                        cycles,
                        height: previous_height,
                        reached_fixed_point: false,
                    });
                }

                session.scroll_to_bottom().await?;
                session.wait(settle).await?;
                cycles += 1;

                let current_height = session.document_height().await?;
                state = if current_height == previous_height {
                    LoadState::Stable {
                        height: current_height,
                    }
                } else {
                    LoadState::Growing {
                        previous_height: current_height,
                    }
                };
            }
        }
    }
}
