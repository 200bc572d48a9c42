//! Well-known trade hub stations.

/// Jita IV - Moon 4 - Caldari Navy Assembly Plant.
pub const JITA: i64 = 60003760;
/// Amarr VIII (Oris) - Emperor Family Academy.
pub const AMARR: i64 = 60008494;
/// Dodixie IX - Moon 20 - Federation Navy Assembly Plant.
pub const DODIXIE: i64 = 60011866;
/// Rens VI - Moon 8 - Brutor Tribe Treasury.
pub const RENS: i64 = 60004588;
/// Hek VIII - Moon 12 - Boundless Creation Factory.
pub const HEK: i64 = 60005686;

/// Default set of hubs scanned for cross-hub routes.
pub const DEFAULT_HUBS: [i64; 5] = [JITA, AMARR, DODIXIE, RENS, HEK];

/// Short display name for a hub, if it is one of the main five.
pub fn hub_name(hub_id: i64) -> Option<&'static str> {
    match hub_id {
        JITA => Some("Jita"),
        AMARR => Some("Amarr"),
        DODIXIE => Some("Dodixie"),
        RENS => Some("Rens"),
        HEK => Some("Hek"),
        _ => None,
    }
}

/// Display label: the hub name when known, the raw id otherwise.
pub fn hub_label(hub_id: i64) -> String {
    hub_name(hub_id)
        .map(str::to_string)
        .unwrap_or_else(|| hub_id.to_string())
}
