//! Persistent object contract
//!
//! Domain types plug into the engine by implementing [`Persistent`]: they
//! say how to turn themselves into an immutable stored form and back, and
//! which other persistent objects they currently hold in memory.
//!
//! Inside a transaction every persistent value lives in a [`Tracked`] wrapper
//! that carries what the engine needs to know about it (handle, owning
//! transaction, dirtiness) and gives it a stable identity. The transaction
//! works with tracked objects through the object-safe [`StmObject`] trait so
//! it never needs to know their concrete type.
//!
//! References between objects are [`Link`]s: either nothing, a bare handle
//! that still has to be read, or an in-memory object.

use mvstm_core::{Handle, StmError, StmResult, TxnId};
use std::any::{self, Any};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::transaction::Transaction;

/// Shared reference to any tracked object
pub type ObjectRef = Rc<dyn StmObject>;

/// A type the engine can store
///
/// # Example
///
/// ```
/// use mvstm_concurrency::Persistent;
///
/// #[derive(Clone)]
/// struct Counter {
///     count: u64,
/// }
///
/// impl Persistent for Counter {
///     type Stored = u64;
///
///     fn dehydrate(&self) -> u64 {
///         self.count
///     }
///
///     fn hydrate(stored: &u64) -> Self {
///         Counter { count: *stored }
///     }
/// }
/// ```
pub trait Persistent: Sized + 'static {
    /// Immutable form kept in the heap
    type Stored: Send + Sync + 'static;

    /// Objects of this type never change once stored
    ///
    /// Immutable objects are not cached by transactions: every read hydrates
    /// a new instance, and mutating one after it was stored has no effect.
    const IMMUTABLE: bool = false;

    /// Produce the stored form
    fn dehydrate(&self) -> Self::Stored;

    /// Rebuild an object from its stored form
    fn hydrate(stored: &Self::Stored) -> Self;

    /// Persistent objects this one holds in memory
    ///
    /// Members that are only known by handle are not listed; they cannot be
    /// fresh.
    fn members(&self) -> Vec<ObjectRef> {
        Vec::new()
    }
}

/// Type-erased stored form of a persistent object
#[derive(Clone)]
pub struct StoredObject {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl StoredObject {
    /// Wrap the stored form of a `T`
    pub fn of<T: Persistent>(stored: T::Stored) -> Self {
        Self {
            inner: Arc::new(stored),
            type_name: any::type_name::<T>(),
        }
    }

    /// Name of the persistent type that produced this value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check whether this value was produced by a `T`
    pub fn is<T: Persistent>(&self) -> bool {
        self.type_name == any::type_name::<T>() && self.inner.is::<T::Stored>()
    }

    /// Borrow the stored form, if it was produced by a `T`
    pub fn downcast_ref<T: Persistent>(&self) -> Option<&T::Stored> {
        if self.type_name != any::type_name::<T>() {
            return None;
        }
        self.inner.downcast_ref::<T::Stored>()
    }
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoredObject").field(&self.type_name).finish()
    }
}

/// Object-safe view of a tracked object
pub trait StmObject {
    /// Handle, or [`Handle::NULL`] if never attached
    fn handle(&self) -> Handle;

    /// Transaction this object is bound to
    fn owner(&self) -> Option<TxnId>;

    /// Whether the object's own state changed since it was read or stored
    fn is_dirty(&self) -> bool;

    /// Whether the underlying type is [`Persistent::IMMUTABLE`]
    fn is_immutable(&self) -> bool;

    /// Bind to a transaction under a handle
    fn bind(&self, handle: Handle, owner: TxnId);

    /// Forget pending modifications after a successful commit
    fn mark_clean(&self);

    /// Produce the stored form
    fn dehydrate(&self) -> StoredObject;

    /// Persistent objects held in memory
    fn members(&self) -> Vec<ObjectRef>;

    /// Name of the underlying persistent type
    fn type_name(&self) -> &'static str;

    /// Upcast for downcasting back to a concrete [`Tracked`]
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Identity of an object, stable for as long as it is alive
pub fn identity(object: &ObjectRef) -> usize {
    Rc::as_ptr(object) as *const () as usize
}

struct TrackedInner<T> {
    handle: Cell<Handle>,
    owner: Cell<Option<TxnId>>,
    dirty: Cell<bool>,
    state: RefCell<T>,
}

impl<T: Persistent> StmObject for TrackedInner<T> {
    fn handle(&self) -> Handle {
        self.handle.get()
    }

    fn owner(&self) -> Option<TxnId> {
        self.owner.get()
    }

    fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn is_immutable(&self) -> bool {
        T::IMMUTABLE
    }

    fn bind(&self, handle: Handle, owner: TxnId) {
        self.handle.set(handle);
        self.owner.set(Some(owner));
    }

    fn mark_clean(&self) {
        self.dirty.set(false);
    }

    fn dehydrate(&self) -> StoredObject {
        StoredObject::of::<T>(self.state.borrow().dehydrate())
    }

    fn members(&self) -> Vec<ObjectRef> {
        self.state.borrow().members()
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A persistent value inside a transaction
///
/// Cloning a `Tracked` clones the reference, not the value: both clones are
/// the same object.
pub struct Tracked<T>(Rc<TrackedInner<T>>);

impl<T: Persistent> Tracked<T> {
    /// Wrap a new value that has never been stored
    ///
    /// The object is dirty and unattached until a transaction attaches it.
    pub fn new(value: T) -> Self {
        Self(Rc::new(TrackedInner {
            handle: Cell::new(Handle::NULL),
            owner: Cell::new(None),
            dirty: Cell::new(true),
            state: RefCell::new(value),
        }))
    }

    pub(crate) fn hydrated(value: T, handle: Handle, owner: TxnId) -> Self {
        Self(Rc::new(TrackedInner {
            handle: Cell::new(handle),
            owner: Cell::new(Some(owner)),
            dirty: Cell::new(false),
            state: RefCell::new(value),
        }))
    }

    pub(crate) fn from_object(object: ObjectRef) -> StmResult<Self> {
        let handle = object.handle();
        let found = object.type_name();
        object
            .into_any()
            .downcast::<TrackedInner<T>>()
            .map(Self)
            .map_err(|_| {
                StmError::InvalidArgument(format!(
                    "{} holds a {}, not a {}",
                    handle,
                    found,
                    any::type_name::<T>()
                ))
            })
    }

    /// Borrow the value
    ///
    /// # Panics
    ///
    /// If the value is currently borrowed mutably.
    pub fn get(&self) -> Ref<'_, T> {
        self.0.state.borrow()
    }

    /// Borrow the value mutably and mark the object dirty
    ///
    /// # Panics
    ///
    /// If the value is currently borrowed.
    pub fn get_mut(&self) -> RefMut<'_, T> {
        self.0.dirty.set(true);
        self.0.state.borrow_mut()
    }

    /// Modify the value in place and mark the object dirty
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get_mut())
    }

    /// Replace the value and mark the object dirty
    pub fn set(&self, value: T) {
        *self.get_mut() = value;
    }

    /// Handle, or [`Handle::NULL`] if not attached yet
    pub fn handle(&self) -> Handle {
        self.0.handle.get()
    }

    /// Transaction the object is bound to
    pub fn owner(&self) -> Option<TxnId> {
        self.0.owner.get()
    }

    /// Whether the object has uncommitted modifications
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// Whether the object has been attached to a transaction
    pub fn is_attached(&self) -> bool {
        self.0.owner.get().is_some()
    }

    /// Type-erased reference to the same object
    pub fn as_object(&self) -> ObjectRef {
        Rc::clone(&self.0) as ObjectRef
    }

    /// Check whether two wrappers are the same object
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl<T> Tracked<T> {
    /// Take the value out if no other reference to the object exists
    ///
    /// Returns the wrapper unchanged otherwise. Types that link to their own
    /// kind use this to unlink long chains iteratively when dropped.
    pub fn try_unwrap(self) -> Result<T, Self> {
        Rc::try_unwrap(self.0)
            .map(|inner| inner.state.into_inner())
            .map_err(Tracked)
    }
}

impl<T: Persistent> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Persistent + fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("handle", &self.handle())
            .field("dirty", &self.is_dirty())
            .field("value", &*self.0.state.borrow())
            .finish()
    }
}

/// Reference from one persistent object to another
pub enum Link<T> {
    /// No object
    Null,
    /// Stored object not read yet
    Handle(Handle),
    /// Object in memory
    Object(Tracked<T>),
}

impl<T: Persistent> Link<T> {
    /// The null link
    pub fn null() -> Self {
        Link::Null
    }

    /// Link to an in-memory object
    pub fn to(object: &Tracked<T>) -> Self {
        Link::Object(object.clone())
    }

    /// Link to a stored object; the null handle gives [`Link::Null`]
    pub fn from_handle(handle: Handle) -> Self {
        if handle.is_null() {
            Link::Null
        } else {
            Link::Handle(handle)
        }
    }

    /// Handle of the target, [`Handle::NULL`] for null or unattached targets
    pub fn handle(&self) -> Handle {
        match self {
            Link::Null => Handle::NULL,
            Link::Handle(handle) => *handle,
            Link::Object(object) => object.handle(),
        }
    }

    /// Check for the null link
    pub fn is_null(&self) -> bool {
        matches!(self, Link::Null)
    }

    /// The target object, read through `txn` if not in memory
    pub fn resolve(&self, txn: &mut Transaction) -> StmResult<Option<Tracked<T>>> {
        match self {
            Link::Null => Ok(None),
            Link::Handle(handle) => txn.load::<T>(*handle).map(Some),
            Link::Object(object) => Ok(Some(object.clone())),
        }
    }

    /// The target as a walkable member, if it is in memory
    pub fn member(&self) -> Option<ObjectRef> {
        match self {
            Link::Object(object) => Some(object.as_object()),
            _ => None,
        }
    }
}

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self {
        match self {
            Link::Null => Link::Null,
            Link::Handle(handle) => Link::Handle(*handle),
            Link::Object(object) => Link::Object(Tracked(Rc::clone(&object.0))),
        }
    }
}

impl<T> Default for Link<T> {
    fn default() -> Self {
        Link::Null
    }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Null => f.write_str("Null"),
            Link::Handle(handle) => write!(f, "Handle({})", handle),
            Link::Object(object) => write!(f, "Object({})", object.0.handle.get()),
        }
    }
}
