//! Scope kinds and the declarative markers that select them.

/// Where instances of a type live once created.
///
/// # Examples
///
/// ```rust
/// use lineage_di::ScopeKind;
///
/// assert!(ScopeKind::RequestScoped.is_request_scoped());
/// assert!(!ScopeKind::Global.is_request_scoped());
/// assert_eq!(ScopeKind::from_request_flag(true), ScopeKind::RequestScoped);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum ScopeKind {
    /// One instance for the whole process
    ///
    /// Stored in the global instance table and observed by every execution
    /// unit, inside or outside a request lineage.
    Global,
    /// One instance per request lineage
    ///
    /// Stored in the context of the unit that created it and inherited by
    /// every unit spawned from it afterwards. Outside a request lineage the
    /// type degrades to a global singleton.
    RequestScoped,
}

impl ScopeKind {
    /// Whether instances of this kind live in unit contexts.
    #[inline]
    pub fn is_request_scoped(self) -> bool {
        matches!(self, ScopeKind::RequestScoped)
    }

    /// Maps the cached boolean decision back to a kind.
    #[inline]
    pub fn from_request_flag(is_request_scoped: bool) -> Self {
        if is_request_scoped {
            ScopeKind::RequestScoped
        } else {
            ScopeKind::Global
        }
    }
}

/// Declarative scope marker attached to a type or to its static initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum ScopeMarker {
    /// Instances are request-bound
    RequestScoped,
    /// Instances are process-wide singletons
    Singleton,
}

impl From<ScopeKind> for ScopeMarker {
    fn from(kind: ScopeKind) -> Self {
        match kind {
            ScopeKind::Global => ScopeMarker::Singleton,
            ScopeKind::RequestScoped => ScopeMarker::RequestScoped,
        }
    }
}

/// Storage tier an instance was served from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The process-wide instance table
    Global,
    /// The current unit's context
    Request,
}
