//! GC-shape canonicalization.
//!
//! Two concrete types get the same shape when their machine representation is the same:
//! same sequence of scalar components, same padding, same pointer words. Instantiations are
//! shared per shape tuple.

use stencil_config::DebugTrace;
use stencil_diagnostics::message::InternalError;
use stencil_log::trace_dbg;
use stencil_type::types::{RecordField, Type, TypeId};

use crate::session::{EngineResult, Session};

/// Name component of a top-level interface shape.
const INTERFACE_COMPONENT: &str = "iface";

#[derive(Default)]
struct ShapeParts {
  name: String,
  fields: Vec<TypeId>,
}

impl ShapeParts {
  fn push(
    &mut self,
    component: &str,
    field: TypeId,
  ) {
    self.name.push_str(component);
    self.fields.push(field);
  }
}

impl Session {
  /// Canonical shape of a concrete type. Shapes map to themselves.
  pub fn shape_of(
    &mut self,
    ty: TypeId,
  ) -> EngineResult<TypeId> {
    if self.types.is_shape(&ty) {
      return Ok(ty);
    }

    if let Some(&shape) = self.shapes.get(&ty) {
      return Ok(shape);
    }

    if self.types.has_type_param(&ty) {
      return Err(
        InternalError::NotConcrete {
          ty: self.type_name(&ty),
          span: Default::default(),
        }
        .report(),
      );
    }

    let instantiated = matches!(self.types.get(&ty), Type::Named { args, .. } if !args.is_empty());

    // Interfaces keep a shape of their own: a shared body converts them statically.
    let mut parts = ShapeParts::default();
    if self.types.is_interface(ty, &self.defs) {
      let empty = self.types.empty_interface();
      parts.push(INTERFACE_COMPONENT, empty);
    } else {
      self.accumulate_shape(ty, &mut parts)?;
    }

    let name = if instantiated {
      format!("shape.instshape-{}", parts.name)
    } else {
      format!("shape.{}", parts.name)
    };

    let underlying = match parts.fields.as_slice() {
      [single] => *single,
      fields => {
        let fields: Vec<RecordField> = fields
          .iter()
          .enumerate()
          .map(|(i, f)| RecordField {
            name: self.symbols.intern(&format!("F{}", i)),
            type_id: *f,
          })
          .collect();
        self.types.record(fields)
      },
    };

    let shape = self.types.shape(name, underlying, instantiated);

    if cfg!(debug_assertions) {
      let (original, _) = self.size_align(ty)?;
      let (shaped, _) = self.size_align(shape)?;
      debug_assert_eq!(
        original,
        shaped,
        "shape of {} changes its size",
        self.type_name(&ty)
      );
    }

    trace_dbg!(
      &self.config,
      DebugTrace::Shape,
      "{} -> {}",
      self.type_name(&ty),
      self.type_name(&shape)
    );

    self.shape_parts.insert(shape, (parts.name, parts.fields));
    self.shapes.insert(ty, shape);
    Ok(shape)
  }

  fn accumulate_shape(
    &mut self,
    ty: TypeId,
    parts: &mut ShapeParts,
  ) -> EngineResult<()> {
    if self.types.is_interface(ty, &self.defs) {
      self.push_interface_words(parts);
      return Ok(());
    }

    if self.types.is_shape(&ty) {
      let (name, fields) = match self.shape_parts.get(&ty) {
        Some(known) => known.clone(),
        None => {
          let underlying = self.types.underlying(ty, &self.defs);
          let mut inner = ShapeParts::default();
          self.accumulate_shape(underlying, &mut inner)?;
          (inner.name, inner.fields)
        },
      };
      parts.name.push_str(&name);
      parts.fields.extend(fields);
      return Ok(());
    }

    let underlying = self.types.underlying(ty, &self.defs);

    match self.types.get(&underlying).clone() {
      Type::I8 | Type::Boolean => parts.push("i1", self.types.i8()),
      Type::U8 => parts.push("u1", self.types.u8()),
      Type::I16 => parts.push("i2", self.types.i16()),
      Type::U16 => parts.push("u2", self.types.u16()),
      Type::I32 | Type::Char => parts.push("i4", self.types.i32()),
      Type::U32 => parts.push("u4", self.types.u32()),
      Type::I64 => parts.push("i8", self.types.i64()),
      Type::U64 => parts.push("u8", self.types.u64()),
      Type::Int => {
        let (name, field) = self.int_component();
        parts.push(name, field);
      },
      Type::Uint | Type::Uintptr => {
        let (name, field) = self.uint_component();
        parts.push(name, field);
      },
      Type::F32 => parts.push("f4", self.types.f32()),
      Type::F64 => parts.push("f8", self.types.f64()),
      Type::Pointer(_) | Type::Function { .. } | Type::Map { .. } | Type::UnsafePointer => {
        parts.push("p", self.types.unsafe_pointer())
      },
      Type::String => {
        parts.push("p", self.types.unsafe_pointer());
        let (name, field) = self.int_component();
        parts.push(name, field);
      },
      Type::Slice(_) => {
        parts.push("p", self.types.unsafe_pointer());
        let (name, field) = self.int_component();
        parts.push(name, field);
        parts.push(name, field);
      },
      Type::Interface { .. } => self.push_interface_words(parts),
      Type::Void => {},
      Type::Array { element, size } => match size {
        0 => {},
        1 => self.accumulate_shape(element, parts)?,
        n => {
          let element_shape = self.shape_of(element)?;
          let element_name = self
            .shape_parts
            .get(&element_shape)
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
          let field = self.types.array(element_shape, n);
          parts.push(&format!("[{}]({})", n, element_name), field);
        },
      },
      Type::Record { fields } => {
        let field_types: Vec<TypeId> = fields.iter().map(|f| f.type_id).collect();
        let (offsets, size, _) = self.record_layout(&field_types)?;

        let mut cursor = 0;
        for (field, offset) in field_types.iter().zip(offsets) {
          if offset > cursor {
            self.push_padding(parts, offset - cursor);
          }
          self.accumulate_shape(*field, parts)?;
          let (field_size, _) = self.size_align(*field)?;
          cursor = offset + field_size;
        }

        if size > cursor {
          self.push_padding(parts, size - cursor);
        }
      },
      Type::Tuple(_) => {
        return Err(
          InternalError::TupleHasNoShape {
            ty: self.type_name(&ty),
            span: Default::default(),
          }
          .report(),
        );
      },
      Type::Param(_) | Type::Named { .. } | Type::Shape { .. } => {
        return Err(
          InternalError::NotConcrete {
            ty: self.type_name(&ty),
            span: Default::default(),
          }
          .report(),
        );
      },
    }

    Ok(())
  }

  /// An interface stored inside another value is just its two pointer words.
  fn push_interface_words(
    &mut self,
    parts: &mut ShapeParts,
  ) {
    let word = self.types.unsafe_pointer();
    parts.push("p", word);
    parts.push("p", word);
  }

  fn push_padding(
    &mut self,
    parts: &mut ShapeParts,
    bytes: u64,
  ) {
    let byte = self.types.u8();
    let pad = self.types.array(byte, bytes);
    parts.push(&format!("a{}", bytes), pad);
  }

  fn int_component(&self) -> (&'static str, TypeId) {
    if self.config.pointer_size == 4 {
      ("i4", self.types.i32())
    } else {
      ("i8", self.types.i64())
    }
  }

  fn uint_component(&self) -> (&'static str, TypeId) {
    if self.config.pointer_size == 4 {
      ("u4", self.types.u32())
    } else {
      ("u8", self.types.u64())
    }
  }

  /// Size and alignment in bytes under the configured pointer size.
  pub fn size_align(
    &mut self,
    ty: TypeId,
  ) -> EngineResult<(u64, u64)> {
    let ptr = self.config.pointer_size;
    let underlying = self.types.underlying(ty, &self.defs);

    let layout = match self.types.get(&underlying).clone() {
      Type::I8 | Type::U8 | Type::Boolean => (1, 1),
      Type::I16 | Type::U16 => (2, 2),
      Type::I32 | Type::U32 | Type::F32 | Type::Char => (4, 4),
      Type::I64 | Type::U64 | Type::F64 => (8, 8),
      Type::Int | Type::Uint | Type::Uintptr => (ptr, ptr),
      Type::Pointer(_) | Type::Function { .. } | Type::Map { .. } | Type::UnsafePointer => (ptr, ptr),
      Type::String | Type::Interface { .. } => (2 * ptr, ptr),
      Type::Slice(_) => (3 * ptr, ptr),
      Type::Void => (0, 1),
      Type::Array { element, size } => {
        let (element_size, align) = self.size_align(element)?;
        (element_size * size, align)
      },
      Type::Record { fields } => {
        let field_types: Vec<TypeId> = fields.iter().map(|f| f.type_id).collect();
        let (_, size, align) = self.record_layout(&field_types)?;
        (size, align)
      },
      Type::Tuple(elements) => {
        let (_, size, align) = self.record_layout(&elements)?;
        (size, align)
      },
      Type::Param(_) | Type::Named { .. } | Type::Shape { .. } => {
        return Err(
          InternalError::NotConcrete {
            ty: self.type_name(&ty),
            span: Default::default(),
          }
          .report(),
        );
      },
    };

    Ok(layout)
  }

  /// Field offsets, total size and alignment of a C-like record of `fields`.
  fn record_layout(
    &mut self,
    fields: &[TypeId],
  ) -> EngineResult<(Vec<u64>, u64, u64)> {
    let mut offsets = Vec::with_capacity(fields.len());
    let mut offset = 0;
    let mut max_align = 1;

    for field in fields {
      let (size, align) = self.size_align(*field)?;
      offset = align_to(offset, align);
      offsets.push(offset);
      offset += size;
      max_align = max_align.max(align);
    }

    Ok((offsets, align_to(offset, max_align), max_align))
  }
}

fn align_to(
  offset: u64,
  align: u64,
) -> u64 {
  offset.div_ceil(align) * align
}
