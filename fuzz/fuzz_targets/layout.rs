#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zsd_ctypes::view::share;
use zsd_ctypes::{ElementType, FieldSpec, FieldView, MemoryInstance, PrimitiveKind, StructLayout};

const KINDS: [PrimitiveKind; 10] = [
    PrimitiveKind::I8,
    PrimitiveKind::U8,
    PrimitiveKind::I16,
    PrimitiveKind::U16,
    PrimitiveKind::I32,
    PrimitiveKind::U32,
    PrimitiveKind::I64,
    PrimitiveKind::U64,
    PrimitiveKind::F32,
    PrimitiveKind::F64,
];

#[derive(Debug, Arbitrary)]
struct FuzzField {
    kind_id: u8,
    /// Use the previously built struct as the element type.
    nested: bool,
    count: u8,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    inner: Vec<FuzzField>,
    outer: Vec<FuzzField>,
    base: u8,
    fill: u8,
}

fn build(name: &str, fields: &[FuzzField], nested: Option<&Arc<StructLayout>>) -> StructLayout {
    let specs = fields
        .iter()
        .take(32)
        .enumerate()
        .map(|(i, f)| {
            let element = match nested {
                Some(layout) if f.nested => ElementType::from(layout),
                _ => ElementType::from(KINDS[usize::from(f.kind_id) % KINDS.len()]),
            };
            FieldSpec::new(format!("f{i}"), element, usize::from(f.count % 16))
        })
        .collect();
    StructLayout::new(name, specs).unwrap()
}

// Fuzz target: layout construction and recursive materialization.
//
// Checks the packing invariants on arbitrary field lists, then walks
// every field of an instance placed at an arbitrary base, reading each
// value. Nothing may panic or read outside the instance.
fuzz_target!(|input: FuzzInput| {
    let inner = Arc::new(build("inner", &input.inner, None));
    let layout = build("outer", &input.outer, Some(&inner));

    let mut end = 0;
    for field in layout.fields() {
        assert!(field.offset() >= end);
        end = field.offset() + field.extent();
    }
    assert_eq!(layout.size() % layout.align(), 0);
    assert!(layout.size() >= end);

    let base = usize::from(input.base);
    let mut bytes = vec![input.fill; base + layout.size()];
    let instance = MemoryInstance::new(&layout, share(&mut bytes), base).unwrap();
    walk(instance);
});

fn walk(instance: MemoryInstance<'_>) {
    for (_, view) in instance.fields() {
        match view {
            FieldView::Scalar(scalar) => {
                let value = scalar.value();
                scalar.set_value(value).unwrap();
            }
            FieldView::Array(array) => {
                assert_eq!(array.values().count(), array.len());
            }
            FieldView::Struct(nested) => walk(nested),
            FieldView::StructArray(items) => items.iter().for_each(walk),
        }
    }
}
