//! Namespaced key/value persistence port.
//!
//! Single writer, one namespace open at a time, every put committed
//! before it returns. After a reboot a get returns the last successfully
//! written value or the supplied default. Write failures come back as
//! `false`; callers log and carry on, nothing here is fatal.

use heapless::{FnvIndexMap, String};

pub const MAX_NAMESPACE_LEN: usize = 16;

pub const MAX_KEY_LEN: usize = 16;

pub const MAX_STR_VALUE_LEN: usize = 64;

pub trait KvStore {
    fn open(&mut self, namespace: &str) -> bool;

    fn close(&mut self);

    fn put_u32(&mut self, key: &str, value: u32) -> bool;

    fn get_u32(&mut self, key: &str, default: u32) -> u32;

    fn put_f32(&mut self, key: &str, value: f32) -> bool;

    fn get_f32(&mut self, key: &str, default: f32) -> f32;

    fn put_str(&mut self, key: &str, value: &str) -> bool;

    fn get_str(&mut self, key: &str, default: &str) -> String<MAX_STR_VALUE_LEN>;
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    U32(u32),
    F32(f32),
    Str(String<MAX_STR_VALUE_LEN>),
}

type EntryKey = (String<MAX_NAMESPACE_LEN>, String<MAX_KEY_LEN>);

const MAX_ENTRIES: usize = 128;

/// RAM-backed store. Stands in for the flash backend on the bench and in
/// tests; entries survive open/close cycles on the same instance, which
/// models a reboot of the firmware rather than loss of flash.
pub struct MemoryStore {
    open_ns: Option<String<MAX_NAMESPACE_LEN>>,
    entries: FnvIndexMap<EntryKey, Value, MAX_ENTRIES>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            open_ns: None,
            entries: FnvIndexMap::new(),
        }
    }

    /// Wipe everything, as a flash erase would.
    pub fn erase_all(&mut self) {
        self.entries.clear();
    }

    fn entry_key(&self, key: &str) -> Option<EntryKey> {
        let ns = self.open_ns.as_ref()?;
        let mut k = String::new();
        k.push_str(key).ok()?;
        Some((ns.clone(), k))
    }

    fn put(&mut self, key: &str, value: Value) -> bool {
        let Some(entry_key) = self.entry_key(key) else {
            log::warn!("[store] put '{}' with no open namespace", key);
            return false;
        };
        match self.entries.insert(entry_key, value) {
            Ok(_) => true,
            Err(_) => {
                log::warn!("[store] store full, dropped '{}'", key);
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        let entry_key = self.entry_key(key)?;
        self.entries.get(&entry_key)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn open(&mut self, namespace: &str) -> bool {
        let mut ns = String::new();
        if ns.push_str(namespace).is_err() {
            log::warn!("[store] namespace too long: '{}'", namespace);
            return false;
        }
        self.open_ns = Some(ns);
        true
    }

    fn close(&mut self) {
        self.open_ns = None;
    }

    fn put_u32(&mut self, key: &str, value: u32) -> bool {
        self.put(key, Value::U32(value))
    }

    fn get_u32(&mut self, key: &str, default: u32) -> u32 {
        match self.get(key) {
            Some(Value::U32(v)) => *v,
            _ => default,
        }
    }

    fn put_f32(&mut self, key: &str, value: f32) -> bool {
        self.put(key, Value::F32(value))
    }

    fn get_f32(&mut self, key: &str, default: f32) -> f32 {
        match self.get(key) {
            Some(Value::F32(v)) => *v,
            _ => default,
        }
    }

    fn put_str(&mut self, key: &str, value: &str) -> bool {
        let mut s = String::new();
        if s.push_str(value).is_err() {
            log::warn!("[store] value too long for '{}'", key);
            return false;
        }
        self.put(key, Value::Str(s))
    }

    fn get_str(&mut self, key: &str, default: &str) -> String<MAX_STR_VALUE_LEN> {
        if let Some(Value::Str(v)) = self.get(key) {
            return v.clone();
        }
        let mut s = String::new();
        let _ = s.push_str(default);
        s
    }
}
