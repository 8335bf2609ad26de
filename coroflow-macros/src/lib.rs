//! Attribute macros for `coroflow`.
//!
//! Both macros accept an optional `event_budget = N` that is forwarded
//! to `RuntimeBuilder::event_budget`.

mod utils;

use proc_macro::{TokenStream, TokenTree};

/// Runs an `async fn main` on a fresh `coroflow` runtime.
///
/// ```rust,ignore
/// #[coroflow::main(event_budget = 32)]
/// async fn main() {
///     coroflow::time::sleep(Duration::from_millis(10)).await;
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = match utils::parse_options(attr) {
        Ok(options) => options,
        Err(message) => return utils::compile_error(&message),
    };

    match utils::wrap_body(item, &options) {
        Some(tokens) => tokens.into_iter().collect(),
        None => utils::compile_error("#[coroflow::main] expects a function with a body"),
    }
}

/// Runs an `async fn` test on a fresh `coroflow` runtime.
///
/// ```rust,ignore
/// #[coroflow::test]
/// async fn sleeps() {
///     coroflow::time::sleep(Duration::from_millis(1)).await;
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = match utils::parse_options(attr) {
        Ok(options) => options,
        Err(message) => return utils::compile_error(&message),
    };

    let Some(tokens) = utils::wrap_body(item, &options) else {
        return utils::compile_error("#[coroflow::test] expects a function with a body");
    };

    let test_attr: TokenStream = "#[::core::prelude::v1::test]".parse().unwrap_or_default();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(tokens);

    result.into_iter().collect()
}
