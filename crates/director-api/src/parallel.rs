//! Bounded fan-out over request sub-operations.

use futures::stream::StreamExt;
use futures::Future;

use crate::context::CallContext;
use crate::error::ApiResult;

/// Run one task per item with at most `width` in flight, returning the
/// first error.
///
/// Cancellation of `ctx` wins the race against progress: remaining work
/// is dropped and the context's error is returned. Results of tasks that
/// finish after the first failure are discarded.
pub async fn run_bounded<T, F, Fut>(
    ctx: &CallContext,
    width: usize,
    items: Vec<T>,
    task: F,
) -> ApiResult<()>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ApiResult<()>>,
{
    let mut stream = futures::stream::iter(items.into_iter().map(task)).buffer_unordered(width);
    loop {
        tokio::select! {
            () = ctx.done() => return Err(ctx.error()),
            next = stream.next() => match next {
                Some(Ok(())) => {}
                Some(Err(err)) => return Err(err),
                None => return Ok(()),
            },
        }
    }
}
