//! Deadline-scoped remote calls.
//!
//! Every call gets a tarpc [`Context`] whose deadline is `now + budget`, and is
//! additionally raced against a local timer of the same budget. Whichever fires
//! first ends the call; dropping the in-flight future cancels the request on
//! the channel without closing the channel itself.

use std::future::Future;
use std::time::{Duration, Instant, SystemTime};

use tarpc::context::{self, Context};
use tokio::time::timeout;

use crate::error::{HarnessError, Result};

/// Budget for operator-issued set, get and bulk get calls.
pub const INTERACTIVE_DEADLINE: Duration = Duration::from_secs(1);

/// Budget for each write in a stress burst.
pub const BURST_DEADLINE: Duration = Duration::from_millis(100);

/// Outcome of one remote call and the wall-clock time it took.
#[derive(Debug)]
pub struct Timed<T> {
    pub outcome: Result<T>,
    pub elapsed: Duration,
}

/// Build a request context that expires `budget` from now.
pub fn deadline_context(budget: Duration) -> Context {
    let mut ctx = context::current();
    ctx.deadline = SystemTime::now() + budget;
    ctx
}

/// Run `call` under `budget`. No retries.
pub async fn invoke<T, F, Fut>(budget: Duration, call: F) -> Timed<T>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let ctx = deadline_context(budget);
    let start = Instant::now();
    let outcome = match timeout(budget, call(ctx)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(HarnessError::DeadlineExceeded),
    };
    Timed {
        outcome,
        elapsed: start.elapsed(),
    }
}
