//! Shared builders for allocation tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::{Allocation, Dependent, MipmapControl, Usage};
use crate::context::Context;
use crate::element::{DataType, Element};
use crate::types::Type;

pub(super) fn rgba_2d(ctx: &Context, x: u32, y: u32, mips: bool) -> Allocation {
    let ty = Type::new_2d(Arc::new(Element::rgba_8888()), x, y, mips).unwrap();
    let mipmaps = if mips {
        MipmapControl::Full
    } else {
        MipmapControl::None
    };
    Allocation::new(
        ctx,
        Arc::new(ty),
        mipmaps,
        Usage::SCRIPT | Usage::GRAPHICS_TEXTURE,
    )
    .unwrap()
}

pub(super) fn ref_1d(ctx: &Context, x: u32) -> Allocation {
    let ty = Type::new_1d(Arc::new(Element::object_ref()), x).unwrap();
    Allocation::new(ctx, Arc::new(ty), MipmapControl::None, Usage::SCRIPT)
        .unwrap()
}

/// 1D allocation of `{ id: u32, obj: ObjectRef }` records.
pub(super) fn sprite_1d(ctx: &Context, x: u32) -> Allocation {
    let element = Element::structure(vec![
        ("id".to_owned(), Arc::new(Element::user(DataType::U32, 1).unwrap())),
        ("obj".to_owned(), Arc::new(Element::object_ref())),
    ])
    .unwrap();
    let ty = Type::new_1d(Arc::new(element), x).unwrap();
    Allocation::new(ctx, Arc::new(ty), MipmapControl::None, Usage::SCRIPT)
        .unwrap()
}

pub(super) fn handles(ids: &[u32]) -> Vec<u8> {
    ids.iter().flat_map(|id| id.to_le_bytes()).collect()
}

#[derive(Default)]
pub(super) struct Counter(pub(super) AtomicUsize);

impl Counter {
    pub(super) fn weak(this: &Arc<Self>) -> Weak<dyn Dependent> {
        let dep: Arc<dyn Dependent> = this.clone();
        Arc::downgrade(&dep)
    }

    pub(super) fn hits(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl Dependent for Counter {
    fn force_dirty(&self) {
        let _ = self.0.fetch_add(1, Ordering::Relaxed);
    }
}
