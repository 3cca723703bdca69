//! Per-connection session state.
//!
//! A [`SessionContext`] lives exactly as long as one downstream connection and
//! is shared (by `&mut`) between the two translators. It carries no behavior
//! beyond keeping its invariants:
//!
//! - `authenticated` flips from `false` to `true` exactly once
//! - track identifiers are unique and at least [`FIRST_DYNAMIC_TRACK_ID`],
//!   so never the reserved
//!   [`BACKGROUND_TRACK_ID`](crate::protocol_constants::BACKGROUND_TRACK_ID)

use std::collections::{BTreeSet, HashMap};

use crate::protocol_constants::FIRST_DYNAMIC_TRACK_ID;

/// State owned by a single bridge connection.
#[derive(Debug)]
pub struct SessionContext {
    channel_id: String,
    authenticated: bool,
    /// Upstream track name -> downstream track identifier.
    track_ids: HashMap<String, u32>,
}

impl SessionContext {
    /// Creates a fresh, unauthenticated context for the given channel.
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            authenticated: false,
            track_ids: HashMap::new(),
        }
    }

    /// Returns the channel this session is bound to.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Returns whether the upstream session has delivered its first permissions.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Marks the session as authenticated.
    ///
    /// Returns `true` only for the call that performed the transition,
    /// `false` if the session was already authenticated.
    pub fn mark_authenticated(&mut self) -> bool {
        let first = !self.authenticated;
        self.authenticated = true;
        first
    }

    /// Returns the identifier for `name`, allocating one if needed.
    ///
    /// New identifiers are the smallest unused integer at or above
    /// [`FIRST_DYNAMIC_TRACK_ID`].
    pub fn resolve_or_assign_track_id(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.track_ids.get(name) {
            return id;
        }

        let used: BTreeSet<u32> = self.track_ids.values().copied().collect();
        // Starts above the background id, so it can never be handed out.
        let mut id = FIRST_DYNAMIC_TRACK_ID;
        while used.contains(&id) {
            id += 1;
        }

        log::debug!(
            "[Session {}] Track {:?} assigned id {}",
            self.channel_id,
            name,
            id
        );
        self.track_ids.insert(name.to_string(), id);
        id
    }

    /// Evicts every track whose name is not in `present`.
    ///
    /// Must run before [`resolve_or_assign_track_id`](Self::resolve_or_assign_track_id)
    /// within a status cycle so freed identifiers can be reused immediately.
    pub fn prune_track_ids<'a, I>(&mut self, present: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: BTreeSet<&str> = present.into_iter().collect();
        let channel_id = &self.channel_id;
        self.track_ids.retain(|name, id| {
            let keep = present.contains(name.as_str());
            if !keep {
                log::debug!("[Session {}] Track {:?} evicted (id {})", channel_id, name, id);
            }
            keep
        });
    }

    /// Reverse lookup: the track name currently holding `id`.
    pub fn lookup_track_name(&self, id: u32) -> Option<&str> {
        self.track_ids
            .iter()
            .find(|(_, value)| **value == id)
            .map(|(name, _)| name.as_str())
    }

    /// Number of named tracks currently mapped.
    pub fn track_count(&self) -> usize {
        self.track_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol_constants::BACKGROUND_TRACK_ID;

    #[test]
    fn mark_authenticated_transitions_once() {
        let mut ctx = SessionContext::new("347021");
        assert!(!ctx.is_authenticated());
        assert!(ctx.mark_authenticated());
        assert!(!ctx.mark_authenticated());
        assert!(ctx.is_authenticated());
    }

    #[test]
    fn first_track_gets_first_dynamic_id() {
        let mut ctx = SessionContext::new("347021");
        assert_eq!(ctx.resolve_or_assign_track_id("Alice"), FIRST_DYNAMIC_TRACK_ID);
    }

    #[test]
    fn ids_are_stable_while_name_present() {
        let mut ctx = SessionContext::new("347021");
        let alice = ctx.resolve_or_assign_track_id("Alice");
        let bob = ctx.resolve_or_assign_track_id("Bob");
        assert_ne!(alice, bob);

        ctx.prune_track_ids(["Alice", "Bob"]);
        assert_eq!(ctx.resolve_or_assign_track_id("Bob"), bob);
        assert_eq!(ctx.resolve_or_assign_track_id("Alice"), alice);
    }

    #[test]
    fn freed_id_is_reused_smallest_first() {
        let mut ctx = SessionContext::new("347021");
        assert_eq!(ctx.resolve_or_assign_track_id("A"), 5);
        assert_eq!(ctx.resolve_or_assign_track_id("B"), 6);
        assert_eq!(ctx.resolve_or_assign_track_id("C"), 7);

        ctx.prune_track_ids(["A", "C"]);
        assert_eq!(ctx.resolve_or_assign_track_id("D"), 6);
        assert_eq!(ctx.resolve_or_assign_track_id("E"), 8);
    }

    #[test]
    fn prune_with_empty_set_clears_table() {
        let mut ctx = SessionContext::new("347021");
        ctx.resolve_or_assign_track_id("Alice");
        ctx.prune_track_ids(std::iter::empty());
        assert_eq!(ctx.track_count(), 0);
        assert_eq!(ctx.lookup_track_name(5), None);
    }

    #[test]
    fn lookup_finds_only_live_names() {
        let mut ctx = SessionContext::new("347021");
        let id = ctx.resolve_or_assign_track_id("Alice");
        assert_eq!(ctx.lookup_track_name(id), Some("Alice"));
        assert_eq!(ctx.lookup_track_name(BACKGROUND_TRACK_ID), None);
        assert_eq!(ctx.lookup_track_name(99), None);
    }

    #[test]
    fn allocation_fills_gaps_and_extends_past_the_end() {
        let mut ctx = SessionContext::new("347021");
        for name in ["A", "B", "C", "D"] {
            ctx.resolve_or_assign_track_id(name);
        }
        ctx.prune_track_ids(["B", "D"]);
        assert_eq!(ctx.resolve_or_assign_track_id("E"), 5);
        assert_eq!(ctx.resolve_or_assign_track_id("F"), 7);
        assert_eq!(ctx.resolve_or_assign_track_id("G"), 9);
    }

    #[test]
    fn never_allocates_reserved_ids() {
        let mut ctx = SessionContext::new("347021");
        for i in 0..20 {
            let id = ctx.resolve_or_assign_track_id(&format!("singer-{}", i));
            assert!(id >= FIRST_DYNAMIC_TRACK_ID);
            assert_ne!(id, BACKGROUND_TRACK_ID);
        }
    }
}
