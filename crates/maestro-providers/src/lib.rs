// Model providers for Maestro
//
// All providers speak the chat-completions protocol; this crate supplies
// the wire types, the HTTP driver, and the per-provider factory.

pub mod driver;
pub mod factory;
pub mod protocol;

pub use driver::{AuthStyle, ChatCompletionsDriver};
pub use factory::ProviderDriverFactory;
