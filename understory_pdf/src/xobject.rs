// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Embedded objects: images and captured sub-pictures.

use alloc::string::String;
use alloc::sync::Arc;

use kurbo::{Affine, Rect};

use crate::image::PdfImage;
use crate::resources::{PageResources, Resource};

/// A self-contained sub-picture: a finished content stream plus the resources
/// it names.
#[derive(Debug)]
pub struct FormXObject {
    content: String,
    resources: PageResources,
    bbox: Rect,
    matrix: Option<Affine>,
}

impl FormXObject {
    pub(crate) fn new(
        content: String,
        resources: PageResources,
        bbox: Rect,
        matrix: Option<Affine>,
    ) -> Self {
        Self {
            content,
            resources,
            bbox,
            matrix,
        }
    }

    /// The content stream.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Resources named by the content.
    pub fn resources(&self) -> &PageResources {
        &self.resources
    }

    /// Bounding box in form space.
    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    /// Form-to-user matrix, when the content carries a non-identity initial
    /// transform that has to be undone.
    pub fn matrix(&self) -> Option<Affine> {
        self.matrix
    }
}

/// An object drawn with `Do`.
#[derive(Clone, Debug)]
pub enum XObject {
    /// A raster image.
    Image(Arc<PdfImage>),
    /// A captured sub-picture.
    Form(Arc<FormXObject>),
}

impl XObject {
    /// The form, if this is one.
    pub fn as_form(&self) -> Option<&Arc<FormXObject>> {
        match self {
            Self::Form(form) => Some(form),
            Self::Image(_) => None,
        }
    }

    /// The image, if this is one.
    pub fn as_image(&self) -> Option<&Arc<PdfImage>> {
        match self {
            Self::Image(image) => Some(image),
            Self::Form(_) => None,
        }
    }
}

impl Resource for XObject {
    fn same_resource(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Image(a), Self::Image(b)) => Arc::ptr_eq(a, b),
            (Self::Form(a), Self::Form(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
