// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-device resource tables.
//!
//! Content refers to resources by name (`/G0`, `/X3`, ...). Each namespace is
//! a [`ResourceTable`]: an ordered list where a resource's position is its
//! name index. Tables compare by identity; canonicalizing equal values into a
//! single shared object is the job of [`ResourceCache`](crate::ResourceCache).

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Write as _;

use crate::ext_state::ExtGState;
use crate::font::PdfFont;
use crate::pattern::PdfPattern;
use crate::xobject::XObject;

/// Identity comparison for shared resources.
pub trait Resource {
    /// Returns `true` if both handles refer to the same object.
    fn same_resource(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Resource for Arc<T> {
    fn same_resource(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

/// Resources of one namespace, indexed by first registration.
#[derive(Clone, Debug)]
pub struct ResourceTable<R> {
    items: Vec<R>,
}

impl<R> Default for ResourceTable<R> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<R: Resource + Clone> ResourceTable<R> {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `resource`, registering it if needed.
    ///
    /// Indices are stable for the life of the table and start at zero.
    pub fn intern(&mut self, resource: &R) -> usize {
        if let Some(index) = self.find(resource) {
            return index;
        }
        self.items.push(resource.clone());
        self.items.len() - 1
    }

    /// The index of `resource`, if registered.
    pub fn find(&self, resource: &R) -> Option<usize> {
        self.items.iter().position(|r| r.same_resource(resource))
    }

    /// The resource at `index`.
    pub fn get(&self, index: usize) -> Option<&R> {
        self.items.get(index)
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resources in index order.
    pub fn iter(&self) -> core::slice::Iter<'_, R> {
        self.items.iter()
    }

    /// Forgets every resource.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The four resource namespaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Extended graphics states, named `Gn`.
    ExtGState,
    /// Images and forms, named `Xn`.
    XObject,
    /// Fonts, named `Fn`.
    Font,
    /// Patterns, named `Pn`.
    Pattern,
}

impl ResourceKind {
    /// Name prefix used in content.
    pub const fn prefix(self) -> char {
        match self {
            Self::ExtGState => 'G',
            Self::XObject => 'X',
            Self::Font => 'F',
            Self::Pattern => 'P',
        }
    }

    /// Key of the sub-dictionary in a resource dictionary.
    pub const fn dict_key(self) -> &'static str {
        match self {
            Self::ExtGState => "ExtGState",
            Self::XObject => "XObject",
            Self::Font => "Font",
            Self::Pattern => "Pattern",
        }
    }
}

/// Resources referenced by one content stream.
#[derive(Clone, Debug, Default)]
pub struct PageResources {
    pub(crate) ext_states: ResourceTable<Arc<ExtGState>>,
    pub(crate) xobjects: ResourceTable<XObject>,
    pub(crate) fonts: ResourceTable<Arc<PdfFont>>,
    pub(crate) patterns: ResourceTable<Arc<PdfPattern>>,
}

impl PageResources {
    /// Extended graphics states.
    pub fn ext_states(&self) -> &ResourceTable<Arc<ExtGState>> {
        &self.ext_states
    }

    /// Images and forms.
    pub fn xobjects(&self) -> &ResourceTable<XObject> {
        &self.xobjects
    }

    /// Fonts.
    pub fn fonts(&self) -> &ResourceTable<Arc<PdfFont>> {
        &self.fonts
    }

    /// Patterns.
    pub fn patterns(&self) -> &ResourceTable<Arc<PdfPattern>> {
        &self.patterns
    }

    /// Number of entries in `kind`'s table.
    pub fn count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::ExtGState => self.ext_states.len(),
            ResourceKind::XObject => self.xobjects.len(),
            ResourceKind::Font => self.fonts.len(),
            ResourceKind::Pattern => self.patterns.len(),
        }
    }

    /// Returns `true` if every table is empty.
    pub fn is_empty(&self) -> bool {
        self.ext_states.is_empty()
            && self.xobjects.is_empty()
            && self.fonts.is_empty()
            && self.patterns.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.ext_states.clear();
        self.xobjects.clear();
        self.fonts.clear();
        self.patterns.clear();
    }

    /// Writes the resource dictionary.
    ///
    /// Empty namespaces are omitted. `object_ref` supplies the object number
    /// of the resource at each index; the document assembler owns numbering.
    pub fn write_dict(
        &self,
        out: &mut String,
        mut object_ref: impl FnMut(ResourceKind, usize) -> u32,
    ) {
        out.push_str("<<");
        for kind in [
            ResourceKind::ExtGState,
            ResourceKind::Pattern,
            ResourceKind::XObject,
            ResourceKind::Font,
        ] {
            let count = self.count(kind);
            if count == 0 {
                continue;
            }
            let _ = write!(out, " /{} <<", kind.dict_key());
            for index in 0..count {
                let _ = write!(
                    out,
                    " /{}{index} {} 0 R",
                    kind.prefix(),
                    object_ref(kind, index)
                );
            }
            out.push_str(" >>");
        }
        out.push_str(" /ProcSet [/PDF /Text /ImageB /ImageC /ImageI] >>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_by_identity() {
        let a = Arc::new(ExtGState::NoSoftMask);
        let b = Arc::new(ExtGState::NoSoftMask);
        let mut table = ResourceTable::new();
        assert_eq!(table.intern(&a), 0);
        assert_eq!(table.intern(&b), 1);
        assert_eq!(table.intern(&a.clone()), 0);
        assert_eq!(table.len(), 2);
        assert!(Arc::ptr_eq(table.get(1).unwrap(), &b));
    }

    #[test]
    fn resource_dict_names() {
        let mut resources = PageResources::default();
        resources.ext_states.intern(&Arc::new(ExtGState::NoSoftMask));
        resources.ext_states.intern(&Arc::new(ExtGState::NoSoftMask));
        let mut out = String::new();
        let mut next = 10;
        resources.write_dict(&mut out, |_, _| {
            next += 1;
            next
        });
        assert_eq!(
            out,
            "<< /ExtGState << /G0 11 0 R /G1 12 0 R >> /ProcSet [/PDF /Text /ImageB /ImageC /ImageI] >>"
        );
    }
}
