/// Check if a peer may drive the stream.
///
/// Exactly one chat is allowed. When none is configured, every peer is
/// rejected. Ids are compared after trimming surrounding whitespace.
pub fn is_authorized(peer_id: &str, allowed: Option<&str>) -> bool {
    let Some(allowed) = allowed.map(str::trim).filter(|id| !id.is_empty()) else {
        return false;
    };
    allowed == peer_id.trim()
}
