//! Option bags for cache reads and writes.

use serde_json::Value;

/// Tags attached to a record: either a fixed list or a thunk evaluated at
/// write time.
pub enum Tags {
    /// A fixed list of tag names.
    Static(Vec<String>),
    /// A zero-argument producer, evaluated when the record is written.
    Computed(Box<dyn Fn() -> Vec<String> + Send + Sync>),
}

impl Tags {
    pub(crate) fn resolve(&self) -> Vec<String> {
        match self {
            Tags::Static(names) => names.clone(),
            Tags::Computed(producer) => producer(),
        }
    }
}

/// Derives tag names from the value being written.
///
/// Runs against the encoded-value tree, so it composes with any caller
/// type.
pub type GetTagsFn = Box<dyn Fn(&Value) -> Vec<String> + Send + Sync>;

/// Options for writing a cache entry.
#[derive(Default)]
pub struct WriteOptions {
    /// Lifetime in milliseconds; `0` means permanent. When absent, the
    /// cache façade injects its default.
    pub expires_in: Option<i64>,
    /// Tags to attach to the record.
    pub tags: Option<Tags>,
    /// Dynamic tags derived from the value.
    pub get_tags: Option<GetTagsFn>,
    /// Manager to dispatch to; defaults to `refresh-ahead`.
    pub manager: Option<String>,
}

impl WriteOptions {
    /// Set the record lifetime in milliseconds.
    pub fn with_expires_in(mut self, expires_in_ms: i64) -> Self {
        self.expires_in = Some(expires_in_ms);
        self
    }

    /// Attach a fixed list of tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(Tags::Static(tags.into_iter().map(Into::into).collect()));
        self
    }

    /// Attach a tag thunk evaluated at write time.
    pub fn with_computed_tags<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        self.tags = Some(Tags::Computed(Box::new(producer)));
        self
    }

    /// Derive tags from the value being written.
    pub fn with_get_tags<F>(mut self, get_tags: F) -> Self
    where
        F: Fn(&Value) -> Vec<String> + Send + Sync + 'static,
    {
        self.get_tags = Some(Box::new(get_tags));
        self
    }

    /// Dispatch to the named manager.
    pub fn with_manager(mut self, name: impl Into<String>) -> Self {
        self.manager = Some(name.into());
        self
    }
}

/// Options for reading a cache entry.
#[derive(Default)]
pub struct ReadOptions {
    /// Lifetime applied when the executor's result is written back.
    pub expires_in: Option<i64>,
    /// Tags attached to the written-back record.
    pub tags: Option<Tags>,
    /// Dynamic tags derived from the written-back value.
    pub get_tags: Option<GetTagsFn>,
    /// Manager to dispatch to; defaults to `refresh-ahead`.
    pub manager: Option<String>,
    /// Behavior when another worker holds the single-flight lock;
    /// defaults to `runExecutor`.
    pub locked_key_retrieve_strategy: Option<String>,
}

impl ReadOptions {
    /// Set the record lifetime in milliseconds.
    pub fn with_expires_in(mut self, expires_in_ms: i64) -> Self {
        self.expires_in = Some(expires_in_ms);
        self
    }

    /// Attach a fixed list of tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(Tags::Static(tags.into_iter().map(Into::into).collect()));
        self
    }

    /// Attach a tag thunk evaluated at write time.
    pub fn with_computed_tags<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        self.tags = Some(Tags::Computed(Box::new(producer)));
        self
    }

    /// Derive tags from the value being written back.
    pub fn with_get_tags<F>(mut self, get_tags: F) -> Self
    where
        F: Fn(&Value) -> Vec<String> + Send + Sync + 'static,
    {
        self.get_tags = Some(Box::new(get_tags));
        self
    }

    /// Dispatch to the named manager.
    pub fn with_manager(mut self, name: impl Into<String>) -> Self {
        self.manager = Some(name.into());
        self
    }

    /// Select the locked-key retrieve strategy by name.
    pub fn with_locked_key_retrieve_strategy(mut self, name: impl Into<String>) -> Self {
        self.locked_key_retrieve_strategy = Some(name.into());
        self
    }

    /// The write-side subset of these options, applied when the executor's
    /// result is stored.
    pub(crate) fn into_write(self) -> WriteOptions {
        WriteOptions {
            expires_in: self.expires_in,
            tags: self.tags,
            get_tags: self.get_tags,
            manager: self.manager,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_tags_resolve() {
        let tags = Tags::Static(vec!["a".into(), "b".into()]);
        assert_eq!(tags.resolve(), vec!["a", "b"]);
    }

    #[test]
    fn test_computed_tags_resolve_at_call_time() {
        let tags = Tags::Computed(Box::new(|| vec!["computed".into()]));
        assert_eq!(tags.resolve(), vec!["computed"]);
    }

    #[test]
    fn test_read_options_carry_over_to_write() {
        let options = ReadOptions::default()
            .with_expires_in(500)
            .with_tags(["a"])
            .with_locked_key_retrieve_strategy("waitForResult");
        let write = options.into_write();
        assert_eq!(write.expires_in, Some(500));
        assert!(write.tags.is_some());
    }
}
