use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runtime options accepted by the attribute macros.
#[derive(Default)]
pub(crate) struct Options {
    pub(crate) event_budget: Option<usize>,
}

impl Options {
    /// Returns the `RuntimeBuilder` expression for these options.
    pub(crate) fn builder(&self) -> String {
        let mut builder = String::from("::coroflow::RuntimeBuilder::new()");

        if let Some(n) = self.event_budget {
            builder.push_str(&format!(".event_budget({n})"));
        }

        builder.push_str(".build()");
        builder
    }
}

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Commas nested in groups belong to their group token and never split.
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current = Vec::new();

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' => {
                if !current.is_empty() {
                    args.push(current);
                    current = Vec::new();
                }
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Parses `key = value` pairs such as `event_budget = 16`.
pub(crate) fn parse_options(attr: TokenStream) -> Result<Options, String> {
    let mut options = Options::default();

    for arg in split_args(attr) {
        let [TokenTree::Ident(key), TokenTree::Punct(eq), TokenTree::Literal(value)] =
            arg.as_slice()
        else {
            return Err("expected `key = value`".to_owned());
        };

        if eq.as_char() != '=' {
            return Err(format!("expected `=` after `{key}`"));
        }

        match key.to_string().as_str() {
            "event_budget" => {
                let n = value
                    .to_string()
                    .parse::<usize>()
                    .map_err(|_| "event_budget must be an integer".to_owned())?;
                options.event_budget = Some(n);
            }
            other => return Err(format!("unknown option `{other}`")),
        }
    }

    Ok(options)
}

/// Rewrites `async fn name() { body }` into
/// `fn name() { <runtime>.block_on(async move { body }) }`.
///
/// Returns `None` if the item has no body.
pub(crate) fn wrap_body(item: TokenStream, options: &Options) -> Option<Vec<TokenTree>> {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }

    let pos = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))?;

    let TokenTree::Group(body) = &tokens[pos] else {
        return None;
    };

    let block = format!(
        "{{
            let runtime = {};
            runtime.block_on(async move {{ {} }})
        }}",
        options.builder(),
        body.stream()
    );

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, block.parse().ok()?));

    Some(tokens)
}

/// Expands to a `compile_error!` carrying `message`.
pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
