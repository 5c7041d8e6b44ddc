//! Change feed for observing committed transactions.
//!
//! Events are derived by comparing the snapshot before and after a commit, so
//! observers only ever see changes that were persisted. A transaction that
//! changes nothing emits nothing.
//!
//! ```rust,ignore
//! let store = ProfileStore::open_in_memory();
//! let receiver = store.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("change: {:?}", event);
//!     }
//! });
//! ```

use crate::model::{StoreState, UserProfile};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// The entity did not exist before the commit.
    Insert,
    /// The entity existed and changed.
    Update,
    /// The entity was removed.
    Delete,
}

/// The part of the graph a change applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    /// Scalar fields of the profile (or the profile itself on insert/delete).
    Profile,
    /// A phone line, including its carriers and voicemail record.
    Contact(String),
    /// The support contact list as a whole.
    SupportContacts,
    /// A message.
    Message(i64),
    /// MQTT credentials.
    MqttSettings,
    /// VoIP account.
    VoipSettings,
    /// The fetch watermark.
    Watermark,
}

/// A single change event from the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Sequence number of the commit.
    pub sequence: u64,
    /// What changed.
    pub entity: EntityRef,
    /// Type of change.
    pub change_type: ChangeType,
}

impl ChangeEvent {
    /// Creates an event.
    pub fn new(sequence: u64, entity: EntityRef, change_type: ChangeType) -> Self {
        Self {
            sequence,
            entity,
            change_type,
        }
    }
}

/// Distributes committed changes to subscribers.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    history: RwLock<Vec<ChangeEvent>>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(1024)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
        }
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits the events of one commit, in order.
    pub fn emit_batch(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }
        {
            let mut history = self.history.write();
            history.extend(events.iter().cloned());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        // Disconnected receivers are dropped here.
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| events.iter().all(|e| tx.send(e.clone()).is_ok()));
    }

    /// Returns events with sequence greater than `cursor`, up to `limit`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map(|e| e.sequence).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the events that turn `before` into `after`.
pub fn diff_states(sequence: u64, before: &StoreState, after: &StoreState) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    let mut push = |entity, change_type| events.push(ChangeEvent::new(sequence, entity, change_type));

    match (&before.profile, &after.profile) {
        (None, None) => {}
        (None, Some(new)) => {
            push(EntityRef::Profile, ChangeType::Insert);
            diff_profiles(&UserProfile::default(), new, &mut push);
        }
        (Some(old), None) => {
            diff_profiles(old, &UserProfile::default(), &mut push);
            push(EntityRef::Profile, ChangeType::Delete);
        }
        (Some(old), Some(new)) => {
            if scalars_differ(old, new) {
                push(EntityRef::Profile, ChangeType::Update);
            }
            diff_profiles(old, new, &mut push);
        }
    }

    if before.watermark != after.watermark {
        push(EntityRef::Watermark, ChangeType::Update);
    }
    events
}

fn diff_profiles(
    old: &UserProfile,
    new: &UserProfile,
    push: &mut impl FnMut(EntityRef, ChangeType),
) {
    diff_maps(&old.contacts, &new.contacts, |id| EntityRef::Contact(id.clone()), push);
    diff_maps(&old.messages, &new.messages, |id| EntityRef::Message(*id), push);
    diff_option(&old.mqtt, &new.mqtt, EntityRef::MqttSettings, push);
    diff_option(&old.voip, &new.voip, EntityRef::VoipSettings, push);
    if old.support_contacts != new.support_contacts {
        push(EntityRef::SupportContacts, ChangeType::Update);
    }
}

fn diff_maps<K: Ord, V: PartialEq>(
    old: &BTreeMap<K, V>,
    new: &BTreeMap<K, V>,
    entity: impl Fn(&K) -> EntityRef,
    push: &mut impl FnMut(EntityRef, ChangeType),
) {
    for (key, value) in new {
        match old.get(key) {
            None => push(entity(key), ChangeType::Insert),
            Some(previous) if previous != value => push(entity(key), ChangeType::Update),
            Some(_) => {}
        }
    }
    for key in old.keys().filter(|k| !new.contains_key(*k)) {
        push(entity(key), ChangeType::Delete);
    }
}

fn diff_option<T: PartialEq>(
    old: &Option<T>,
    new: &Option<T>,
    entity: EntityRef,
    push: &mut impl FnMut(EntityRef, ChangeType),
) {
    match (old, new) {
        (None, Some(_)) => push(entity, ChangeType::Insert),
        (Some(_), None) => push(entity, ChangeType::Delete),
        (Some(a), Some(b)) if a != b => push(entity, ChangeType::Update),
        _ => {}
    }
}

// Compares everything except the owned collections.
fn scalars_differ(old: &UserProfile, new: &UserProfile) -> bool {
    let strip = |p: &UserProfile| UserProfile {
        contacts: BTreeMap::new(),
        messages: BTreeMap::new(),
        support_contacts: Vec::new(),
        mqtt: None,
        voip: None,
        user_id: p.user_id.clone(),
        user_name: p.user_name.clone(),
        email: p.email.clone(),
        city: p.city.clone(),
        state: p.state.clone(),
        gender: p.gender.clone(),
        profile_pic_url: p.profile_pic_url.clone(),
        thumbnail_pic_url: p.thumbnail_pic_url.clone(),
        invite_sms_text: p.invite_sms_text.clone(),
        country_iso_code: p.country_iso_code.clone(),
        sim_mcc_mnc: p.sim_mcc_mnc.clone(),
        fb_connect_url: p.fb_connect_url.clone(),
        tw_connect_url: p.tw_connect_url.clone(),
        greeting_name_uri: p.greeting_name_uri.clone(),
        greeting_welcome_uri: p.greeting_welcome_uri.clone(),
        voicemail_email: p.voicemail_email.clone(),
        time_zone: p.time_zone.clone(),
        record_mode: p.record_mode.clone(),
        recording_time: p.recording_time.clone(),
        storage_location: p.storage_location.clone(),
        primary_contact_id: p.primary_contact_id.clone(),
        ..*p
    };
    strip(old) != strip(new)
}
