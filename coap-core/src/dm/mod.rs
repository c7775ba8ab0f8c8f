//! LwM2M-style data-model dispatch: a registry of objects addressed by
//! `/Object/Instance/Resource/ResourceInstance` paths, with Read, Write,
//! Execute, Discover, and the composite variants that operate on several
//! paths in one request.
//!
//! Recursion over instances/resources lives here, in the registry, not in
//! each [`Object`] implementation: an object only answers `list_instances`/
//! `list_resources`/`list_resource_instances`/`resource_read` for exactly
//! the ids it asks about, and the registry walks the hierarchy for a
//! coarser Read or Discover. Every `list_*` call is required to return its
//! ids in strictly ascending order (§4.10); a violation is the object's
//! bug, not the caller's, so it surfaces as `InternalServerError` rather
//! than a silently wrong response.

use std::collections::BTreeMap;

/// A data-model path. `iid`/`rid`/`riid` narrow progressively: an
/// object-only path addresses every instance, an object+instance path
/// every resource on that instance, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
  pub oid: u16,
  pub iid: Option<u16>,
  pub rid: Option<u16>,
  pub riid: Option<u16>,
}

impl Path {
  pub fn object(oid: u16) -> Self {
    Self { oid, iid: None, rid: None, riid: None }
  }

  pub fn instance(oid: u16, iid: u16) -> Self {
    Self { oid, iid: Some(iid), rid: None, riid: None }
  }

  pub fn resource(oid: u16, iid: u16, rid: u16) -> Self {
    Self { oid, iid: Some(iid), rid: Some(rid), riid: None }
  }

  pub fn resource_instance(oid: u16, iid: u16, rid: u16, riid: u16) -> Self {
    Self { oid, iid: Some(iid), rid: Some(rid), riid: Some(riid) }
  }

  /// Whether `self` is a prefix of (or equal to) `other` — used to find
  /// everything a coarser path's Read/Discover should include.
  pub fn is_prefix_of(&self, other: &Path) -> bool {
    if self.oid != other.oid {
      return false;
    }
    match (self.iid, self.rid, self.riid) {
      | (None, _, _) => true,
      | (Some(i), None, _) => other.iid == Some(i),
      | (Some(i), Some(r), None) => other.iid == Some(i) && other.rid == Some(r),
      | (Some(i), Some(r), Some(ri)) => {
        other.iid == Some(i) && other.rid == Some(r) && other.riid == Some(ri)
      },
    }
  }
}

/// A resource's value. LwM2M's resource type table collapses onto these
/// variants; `ObjectLink` keeps the referenced object/instance pair rather
/// than a raw integer so callers can't mix it up with `Integer`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Integer(i64),
  Float(f64),
  Boolean(bool),
  String(String),
  Opaque(Vec<u8>),
  ObjectLink(u16, u16),
}

/// Failure reasons for a data-model operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmError {
  /// No object/instance/resource exists at the given path.
  NotFound,
  /// The resource exists but doesn't support this operation (e.g. Write on
  /// a read-only resource, or Read on an executable-only one).
  MethodNotAllowed,
  /// The written value's type didn't match the resource's.
  WrongType,
  /// An object's `list_instances`/`list_resources`/`list_resource_instances`
  /// returned ids out of strictly ascending order (§4.10). This is a
  /// contract violation by the object, not a client error.
  InternalServerError,
}

/// One object's resource model: answers narrow, single-level questions
/// ("what instances do you have", "what's resource 3 on instance 0") —
/// the [`Registry`] does the recursive walk for a coarser Read or Discover.
pub trait Object {
  fn oid(&self) -> u16;

  /// Every instance id that exists, strictly ascending.
  fn list_instances(&self) -> Vec<u16>;

  /// Every resource id that exists on `iid`, strictly ascending.
  /// `NotFound` if `iid` doesn't exist.
  fn list_resources(&self, iid: u16) -> Result<Vec<u16>, DmError>;

  /// Every resource-instance id under `(iid, rid)`, strictly ascending, or
  /// an empty vec if the resource is single-instance. `NotFound` if
  /// `(iid, rid)` doesn't exist.
  fn list_resource_instances(&self, iid: u16, rid: u16) -> Result<Vec<u16>, DmError>;

  /// Read one resource value. `riid` is `None` for a single-instance
  /// resource. `MethodNotAllowed` for an executable-only resource.
  fn resource_read(&self, iid: u16, rid: u16, riid: Option<u16>) -> Result<Value, DmError>;

  fn resource_write(
    &mut self,
    iid: u16,
    rid: u16,
    riid: Option<u16>,
    value: Value,
  ) -> Result<(), DmError>;

  fn resource_execute(&mut self, iid: u16, rid: u16, args: &[u8]) -> Result<(), DmError>;
}

fn require_ascending(ids: &[u16]) -> Result<(), DmError> {
  if ids.windows(2).any(|w| w[0] >= w[1]) {
    return Err(DmError::InternalServerError);
  }
  Ok(())
}

/// Walk `object` under `path`, collecting `(path, value)` for every
/// resource (or resource instance) it resolves to. A coarser path (object-
/// or instance-only) silently omits resources that answer `MethodNotAllowed`
/// (e.g. executable-only ones) rather than failing the whole read; an
/// explicit resource path propagates that error instead.
fn read_from_object(object: &dyn Object, path: &Path) -> Result<Vec<(Path, Value)>, DmError> {
  let oid = object.oid();
  let explicit_resource = path.rid.is_some();

  let iids = match path.iid {
    | Some(iid) => {
      object.list_resources(iid)?;
      vec![iid]
    },
    | None => {
      let ids = object.list_instances();
      require_ascending(&ids)?;
      ids
    },
  };

  let mut out = Vec::new();
  for iid in iids {
    let rids = match path.rid {
      | Some(rid) => vec![rid],
      | None => {
        let ids = object.list_resources(iid)?;
        require_ascending(&ids)?;
        ids
      },
    };

    for rid in rids {
      let riids = object.list_resource_instances(iid, rid)?;
      require_ascending(&riids)?;

      if riids.is_empty() {
        match object.resource_read(iid, rid, None) {
          | Ok(value) => out.push((Path::resource(oid, iid, rid), value)),
          | Err(DmError::MethodNotAllowed) if !explicit_resource => {},
          | Err(e) => return Err(e),
        }
      } else {
        for riid in riids {
          if path.riid.is_some() && path.riid != Some(riid) {
            continue;
          }
          match object.resource_read(iid, rid, Some(riid)) {
            | Ok(value) => out.push((Path::resource_instance(oid, iid, rid, riid), value)),
            | Err(DmError::MethodNotAllowed) if !explicit_resource => {},
            | Err(e) => return Err(e),
          }
        }
      }
    }
  }

  if out.is_empty() { Err(DmError::NotFound) } else { Ok(out) }
}

/// Walk `object` under `path`, collecting every path it resolves to
/// (Discover lists resources regardless of whether they're readable).
fn discover_from_object(object: &dyn Object, path: &Path) -> Result<Vec<Path>, DmError> {
  let oid = object.oid();

  let iids = match path.iid {
    | Some(iid) => {
      object.list_resources(iid)?;
      vec![iid]
    },
    | None => {
      let ids = object.list_instances();
      require_ascending(&ids)?;
      ids
    },
  };

  let mut out = Vec::new();
  for iid in iids {
    let rids = match path.rid {
      | Some(rid) => {
        object.list_resource_instances(iid, rid)?;
        vec![rid]
      },
      | None => {
        let ids = object.list_resources(iid)?;
        require_ascending(&ids)?;
        ids
      },
    };

    for rid in rids {
      let riids = object.list_resource_instances(iid, rid)?;
      require_ascending(&riids)?;

      if riids.is_empty() {
        out.push(Path::resource(oid, iid, rid));
      } else {
        for riid in riids {
          out.push(Path::resource_instance(oid, iid, rid, riid));
        }
      }
    }
  }

  Ok(out)
}

/// The set of objects a server or client exposes, dispatched to by
/// [`Path::oid`].
#[derive(Default)]
pub struct Registry {
  objects: BTreeMap<u16, Box<dyn Object>>,
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registry")
      .field("objects", &self.objects.keys().collect::<Vec<_>>())
      .finish()
  }
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, object: Box<dyn Object>) {
    self.objects.insert(object.oid(), object);
  }

  fn object(&self, oid: u16) -> Result<&dyn Object, DmError> {
    self.objects.get(&oid).map(|b| b.as_ref()).ok_or(DmError::NotFound)
  }

  fn object_mut(&mut self, oid: u16) -> Result<&mut Box<dyn Object>, DmError> {
    self.objects.get_mut(&oid).ok_or(DmError::NotFound)
  }

  pub fn read(&self, path: &Path) -> Result<Vec<(Path, Value)>, DmError> {
    read_from_object(self.object(path.oid)?, path)
  }

  pub fn write(&mut self, path: &Path, value: Value) -> Result<(), DmError> {
    let iid = path.iid.ok_or(DmError::MethodNotAllowed)?;
    let rid = path.rid.ok_or(DmError::MethodNotAllowed)?;
    self.object_mut(path.oid)?.resource_write(iid, rid, path.riid, value)
  }

  pub fn execute(&mut self, path: &Path, args: &[u8]) -> Result<(), DmError> {
    let iid = path.iid.ok_or(DmError::MethodNotAllowed)?;
    let rid = path.rid.ok_or(DmError::MethodNotAllowed)?;
    self.object_mut(path.oid)?.resource_execute(iid, rid, args)
  }

  pub fn discover(&self, path: &Path) -> Result<Vec<Path>, DmError> {
    discover_from_object(self.object(path.oid)?, path)
  }

  /// Read every path in `paths` independently. Each result is reported
  /// against its own path — later SenML-CBOR serialization can reuse a
  /// shared basename across entries from the same object instance, but
  /// that's an encoding concern, not a dispatch one.
  pub fn composite_read(&self, paths: &[Path]) -> Vec<(Path, Result<Vec<(Path, Value)>, DmError>)> {
    paths.iter().map(|p| (*p, self.read(p))).collect()
  }

  /// Write every `(path, value)` pair independently. A failed write does
  /// not roll back writes that already succeeded — LwM2M's Composite Write
  /// has no transactional guarantee, so the caller gets back exactly which
  /// paths failed and why.
  pub fn composite_write(&mut self, writes: &[(Path, Value)]) -> Vec<(Path, Result<(), DmError>)> {
    writes.iter().map(|(p, v)| (*p, self.write(p, v.clone()))).collect()
  }
}
