//! The event name registry.
//!
//! Every event name resolves to a category and a declared parameter
//! type. The category drives dispatch: channel events queue into the
//! owning channel's local event FIFO, master events mutate global
//! playback state immediately, control events steer the playback mode
//! (and only fire from trigger rows in infinite mode), query events
//! expand into auto events, and auto events exist only in the outgoing
//! event stream.

use compas_core::value::ValueType;

/// Dispatch category of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// Affects one channel's voices or carried controls.
    Channel,
    /// Affects global playback state.
    Master,
    /// No state effect (comments and the like).
    General,
    /// Steers the playback mode from outside the composition.
    Control,
    /// Expands into auto events describing engine state.
    Query,
    /// Generated by the engine itself.
    Auto,
}

/// One registered event name.
#[derive(Debug, Clone, Copy)]
pub struct EventSpec {
    /// The event name.
    pub name: &'static str,
    /// Dispatch category.
    pub category: EventCategory,
    /// Declared parameter type.
    pub param: ValueType,
}

const fn spec(name: &'static str, category: EventCategory, param: ValueType) -> EventSpec {
    EventSpec {
        name,
        category,
        param,
    }
}

/// The full event registry.
static EVENT_SPECS: &[EventSpec] = &[
    // Channel
    spec("n+", EventCategory::Channel, ValueType::Float),
    spec("n-", EventCategory::Channel, ValueType::None),
    spec(".f", EventCategory::Channel, ValueType::Float),
    spec("/f", EventCategory::Channel, ValueType::Float),
    spec("/=f", EventCategory::Channel, ValueType::Tstamp),
    spec("ts", EventCategory::Channel, ValueType::Float),
    spec("td", EventCategory::Channel, ValueType::Float),
    spec("/p", EventCategory::Channel, ValueType::Float),
    spec("/=p", EventCategory::Channel, ValueType::Tstamp),
    spec("vs", EventCategory::Channel, ValueType::Float),
    spec("vd", EventCategory::Channel, ValueType::Float),
    spec(".a", EventCategory::Channel, ValueType::Int),
    // Master
    spec("m.t", EventCategory::Master, ValueType::Float),
    spec("m/t", EventCategory::Master, ValueType::Float),
    spec("m/=t", EventCategory::Master, ValueType::Tstamp),
    spec("m.v", EventCategory::Master, ValueType::Float),
    spec("m/v", EventCategory::Master, ValueType::Float),
    spec("m/=v", EventCategory::Master, ValueType::Tstamp),
    spec("mpd", EventCategory::Master, ValueType::Tstamp),
    spec("m.jc", EventCategory::Master, ValueType::Int),
    spec("m.jp", EventCategory::Master, ValueType::PatInstRef),
    spec("m.jr", EventCategory::Master, ValueType::Tstamp),
    spec("mj", EventCategory::Master, ValueType::None),
    spec("m.gp", EventCategory::Master, ValueType::PatInstRef),
    spec("m.gr", EventCategory::Master, ValueType::Tstamp),
    spec("mg", EventCategory::Master, ValueType::None),
    // General
    spec("#", EventCategory::General, ValueType::MaybeString),
    // Control
    spec("cpause", EventCategory::Control, ValueType::None),
    spec("cresume", EventCategory::Control, ValueType::None),
    spec("c.i", EventCategory::Control, ValueType::Bool),
    // Query
    spec("qlocation", EventCategory::Query, ValueType::None),
    spec("qvoices", EventCategory::Query, ValueType::None),
    spec("qf", EventCategory::Query, ValueType::None),
    // Auto
    spec("Atrack", EventCategory::Auto, ValueType::Int),
    spec("Asystem", EventCategory::Auto, ValueType::Int),
    spec("Apattern", EventCategory::Auto, ValueType::PatInstRef),
    spec("Arow", EventCategory::Auto, ValueType::Tstamp),
    spec("Avoices", EventCategory::Auto, ValueType::Int),
    spec("Avgroups", EventCategory::Auto, ValueType::Int),
    spec("Af", EventCategory::Auto, ValueType::Realtime),
    spec("Aerror", EventCategory::Auto, ValueType::String),
];

/// Looks up an event name.
pub fn lookup(name: &str) -> Option<&'static EventSpec> {
    EVENT_SPECS.iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        let spec = lookup("n+").unwrap();
        assert_eq!(spec.category, EventCategory::Channel);
        assert_eq!(spec.param, ValueType::Float);

        let spec = lookup("mj").unwrap();
        assert_eq!(spec.category, EventCategory::Master);
        assert_eq!(spec.param, ValueType::None);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("zzz").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn test_no_duplicate_names() {
        for (i, a) in EVENT_SPECS.iter().enumerate() {
            for b in &EVENT_SPECS[i + 1..] {
                assert_ne!(a.name, b.name, "duplicate event name {}", a.name);
            }
        }
    }
}
