use crate::error::Result;
use crate::protocol::StompMessage;

/// Callback invoked for every MESSAGE frame delivered to a subscription
///
/// Each live subscription gets its own OS thread; `handle` is called
/// sequentially on that thread in the order frames arrived. It is not an
/// async context, so do blocking work directly.
///
/// Errors are logged and the thread keeps processing subsequent messages.
///
/// Plain closures implement this trait:
///
/// ```ignore
/// client.subscribe("/topic/prices", |msg: StompMessage| {
///     println!("{} -> {}", msg.destination(), msg.body());
/// })?;
/// ```
pub trait MessageHandler: Send + 'static {
    fn handle(&mut self, message: StompMessage) -> Result<()>;
}

impl<F> MessageHandler for F
where
    F: FnMut(StompMessage) + Send + 'static,
{
    fn handle(&mut self, message: StompMessage) -> Result<()> {
        self(message);
        Ok(())
    }
}
