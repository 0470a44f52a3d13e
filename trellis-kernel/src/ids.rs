use rand::Rng;

/// Draws a six-digit token from the shared identifier space.
///
/// Group chains, node identifiers, and synthetic debug job IDs all come from
/// here. The only contract is that collisions are negligible within one
/// workflow; scheduler-assigned job IDs never pass through this function.
pub fn six_digit_token() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}
