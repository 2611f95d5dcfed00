use crate::exchange::Exchange;

/// Render exchanges as a prompt preamble.
///
/// Each exchange becomes a `user:` / `assistant:` line pair, in order, and the
/// block ends with a blank line. No exchanges, no block.
pub fn build_context(exchanges: &[Exchange]) -> String {
    let mut context = String::new();
    if exchanges.is_empty() {
        return context;
    }

    for exchange in exchanges {
        context.push_str(&format!("user: {}\n", exchange.question));
        context.push_str(&format!("assistant: {}\n", exchange.answer));
    }
    context.push('\n');

    context
}
