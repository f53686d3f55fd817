use std::sync::Arc;

use stackcast::{
    model, Artifact, BinaryDriver, BinaryOptions, Component, ComponentStack, Context, Error, Model,
    ModelType, Serializer, Value,
};

model! {
    struct Foo {
        bar: Serializer::string(),
        baz: Serializer::int32(),
        biz: Serializer::int8(),
        ext: Serializer::int32() => { added_in(2), with_default(20) },
    }
}

fn foo(ext: i32) -> Model {
    Foo::instance()
        .with("bar", "bar")
        .and_then(|m| m.with("baz", 1))
        .and_then(|m| m.with("biz", 2))
        .and_then(|m| m.with("ext", ext))
        .unwrap()
}

fn bytes(artifact: &Artifact) -> &[u8] {
    artifact.as_bytes().expect("binary artifact")
}

#[test]
fn scenario_a_dump_v1_and_load_default() {
    let driver = BinaryDriver::default();
    let ctx = Context::at(1);
    let artifact = foo(3).dump(&driver, &ctx).unwrap();
    assert_eq!(bytes(&artifact), b"\x03bar\x00\x00\x00\x01\x02");

    let loaded = Foo::load(&driver, &artifact, &ctx).unwrap();
    assert_eq!(loaded, foo(20));
    assert_ne!(loaded, foo(3));
    assert!(loaded.equals_at(&foo(3), &ctx));
}

#[test]
fn scenario_b_dump_latest_round_trips() {
    let driver = BinaryDriver::default();
    let expected = b"\x03bar\x00\x00\x00\x01\x02\x00\x00\x00\x03";
    for ctx in [Context::at(2), Context::latest()] {
        let artifact = foo(3).dump(&driver, &ctx).unwrap();
        assert_eq!(bytes(&artifact), expected);
        let loaded = Foo::load(&driver, &artifact, &ctx).unwrap();
        assert_eq!(loaded, foo(3));
        assert_eq!(loaded.values(), foo(3).values());
    }
}

#[test]
fn v1_artifact_loaded_at_v2_substitutes_default() {
    let driver = BinaryDriver::default();
    let v1 = foo(3).dump(&driver, &Context::at(1)).unwrap();
    let loaded = Foo::load(&driver, &v1, &Context::at(2)).unwrap();
    assert_eq!(loaded.get("ext").unwrap().as_i64(), Some(20));
}

#[test]
fn v2_artifact_loaded_at_v1_has_trailing_bytes() {
    let driver = BinaryDriver::default();
    let v2 = foo(3).dump(&driver, &Context::at(2)).unwrap();
    let err = Foo::load(&driver, &v2, &Context::at(1)).unwrap_err();
    assert!(matches!(err, Error::MalformedInput { offset: 8, .. }));

    let lenient = BinaryDriver::new(BinaryOptions {
        allow_trailing: true,
        ..BinaryOptions::default()
    });
    let loaded = Foo::load(&lenient, &v2, &Context::at(1)).unwrap();
    assert_eq!(loaded, foo(20));
}

fn member_stack() -> Arc<ComponentStack> {
    Arc::new(
        ComponentStack::builder("member")
            .field("me", Serializer::uint8())
            .field("members", Serializer::array(Serializer::uint8()))
            .build()
            .unwrap(),
    )
}

fn member(me: u8, members: &[u8]) -> Value {
    Value::record([
        ("me", Value::from(me)),
        ("members", Value::array(members.iter().copied())),
    ])
}

#[test]
fn scenario_c_stack_of_nested_models() {
    let group = Arc::new(
        ComponentStack::builder("group")
            .field("elem_0", Serializer::model(member_stack()))
            .field("elem_1", Serializer::model(member_stack()))
            .build()
            .unwrap(),
    );
    let model = Model::new(Arc::clone(&group))
        .with("elem_0", member(0, &[10, 11, 12, 13, 14]))
        .and_then(|m| m.with("elem_1", member(2, &[0])))
        .unwrap();

    let driver = BinaryDriver::default();
    let ctx = Context::latest();
    let artifact = model.dump(&driver, &ctx).unwrap();
    assert_eq!(
        bytes(&artifact),
        b"\x00\x05\x0A\x0B\x0C\x0D\x0E\x02\x01\x00"
    );
    let loaded = Model::load(group, &driver, &artifact, &ctx).unwrap();
    assert_eq!(loaded, model);
}

#[test]
fn array_of_nested_models_carries_a_count() {
    let driver = BinaryDriver::default();
    let s = Serializer::array(Serializer::model(member_stack()));
    let value = Value::array([member(1, &[10, 11, 12, 13, 14]), member(2, &[0])]);
    let ctx = Context::latest();
    let encoded = driver.encode_value(&s, &value, &ctx).unwrap();
    assert_eq!(encoded, b"\x02\x01\x05\x0A\x0B\x0C\x0D\x0E\x02\x01\x00");
    let (decoded, used) = driver.decode_value(&s, &encoded, &ctx).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(used, encoded.len());
}

#[test]
fn nested_stack_components_inline_their_fields() {
    let header = ComponentStack::builder("header")
        .field("kind", Serializer::uint8())
        .push(Component::new("flags", Serializer::uint16()).added_in(3).with_default(0u16))
        .build()
        .unwrap();
    let packet = Arc::new(
        ComponentStack::builder("packet")
            .push(Component::new("header", header).added_in(2))
            .field("body", Serializer::bytes())
            .build()
            .unwrap(),
    );
    let model = Model::new(Arc::clone(&packet))
        .with("header", Value::record([("kind", Value::from(7u8)), ("flags", Value::from(0x0102u16))]))
        .and_then(|m| m.with("body", Value::bytes(*b"hi")))
        .unwrap();

    let driver = BinaryDriver::default();
    let matrix: [(u32, &[u8]); 3] = [
        (1, b"\x02hi"),
        (2, b"\x07\x02hi"),
        (3, b"\x07\x01\x02\x02hi"),
    ];
    for (version, expected) in matrix {
        let ctx = Context::at(version);
        let artifact = model.dump(&driver, &ctx).unwrap();
        assert_eq!(bytes(&artifact), expected, "version {version}");
        let loaded = Model::load(Arc::clone(&packet), &driver, &artifact, &ctx).unwrap();
        assert!(loaded.equals_at(&model, &ctx), "version {version}");
    }
}

#[test]
fn decode_errors_name_the_component_and_offset() {
    let driver = BinaryDriver::default();
    let cases: [(&[u8], &str, usize); 3] = [
        (b"\x09ba", "bar", 0),
        (b"\x03bar\x00\x00", "baz", 4),
        (b"\x03bar\x00\x00\x00\x01", "biz", 8),
    ];
    for (input, component, offset) in cases {
        let err = Foo::load(&driver, &Artifact::Bytes(input.to_vec()), &Context::at(1)).unwrap_err();
        assert_eq!(err.component(), Some(component), "{input:?}");
        assert_eq!(err.offset(), Some(offset), "{input:?}");
    }
}

#[test]
fn nested_errors_carry_the_full_path() {
    let group = Arc::new(
        ComponentStack::builder("group")
            .field("members", Serializer::array(Serializer::model(member_stack())))
            .build()
            .unwrap(),
    );
    let model = Model::new(group)
        .with(
            "members",
            Value::array([member(1, &[1]), member(2, &[1, 2, 3])]),
        )
        .unwrap();
    let bad = model
        .clone()
        .with(
            "members",
            Value::array([member(1, &[1]), Value::record([("me", Value::from(300)), ("members", Value::array([1u8]))])]),
        )
        .unwrap();
    let err = bad.dump(&BinaryDriver::default(), &Context::latest()).unwrap_err();
    assert_eq!(err.component(), Some("members[1].me"));
    assert!(matches!(err, Error::Range { .. }));

    assert!(model.dump(&BinaryDriver::default(), &Context::latest()).is_ok());
}

#[test]
fn optional_fields_round_trip_absent() {
    let stack = Arc::new(
        ComponentStack::builder("opt")
            .field("nick", Serializer::optional(Serializer::string()))
            .field("age", Serializer::optional(Serializer::uint8()))
            .build()
            .unwrap(),
    );
    let model = Model::new(Arc::clone(&stack))
        .with("nick", Value::None)
        .and_then(|m| m.with("age", 30u8))
        .unwrap();
    let driver = BinaryDriver::default();
    let artifact = model.dump(&driver, &Context::latest()).unwrap();
    assert_eq!(bytes(&artifact), [0x00, 0x01, 30]);
    assert_eq!(Model::load(stack, &driver, &artifact, &Context::latest()).unwrap(), model);
}

#[test]
fn interleaved_addition_breaks_older_binary_artifacts() {
    let stack = Arc::new(
        ComponentStack::builder("interleaved")
            .field("a", Serializer::uint8())
            .push(Component::new("ext", Serializer::uint8()).added_in(2).with_default(9u8))
            .field("b", Serializer::uint8())
            .build()
            .unwrap(),
    );
    assert_eq!(stack.out_of_order_additions(), vec!["ext".to_owned()]);
    let model = Model::new(Arc::clone(&stack))
        .with("a", 1u8)
        .and_then(|m| m.with("b", 2u8))
        .unwrap();

    let driver = BinaryDriver::default();
    let v1 = model.dump(&driver, &Context::at(1)).unwrap();
    assert_eq!(bytes(&v1), [1, 2]);
    let err = Model::load(Arc::clone(&stack), &driver, &v1, &Context::at(2)).unwrap_err();
    assert!(matches!(err, Error::TruncatedInput { ref component, offset: 2, .. } if component == "b"));

    // keyed layouts are unaffected
    let json = stackcast::JsonDriver::default();
    let text = model.dump(&json, &Context::at(1)).unwrap();
    let loaded = Model::load(stack, &json, &text, &Context::at(2)).unwrap();
    assert_eq!(loaded.get("ext").unwrap().as_u64(), Some(9));
    assert_eq!(loaded.get("b").unwrap().as_u64(), Some(2));
}

#[test]
fn pinned_nested_stack_keeps_its_own_version() {
    let header = ComponentStack::builder("header")
        .field("kind", Serializer::uint8())
        .push(Component::new("flags", Serializer::uint16()).added_in(2).with_default(0u16))
        .build()
        .unwrap();
    let packet = Arc::new(
        ComponentStack::builder("packet")
            .field("id", Serializer::uint8())
            .push(Component::new("header", header).pinned(1))
            .push(Component::new("tail", Serializer::uint8()).added_in(3))
            .build()
            .unwrap(),
    );
    let model = Model::new(Arc::clone(&packet))
        .with("id", 5u8)
        .and_then(|m| {
            m.with(
                "header",
                Value::record([("kind", Value::from(7u8)), ("flags", Value::from(0x0102u16))]),
            )
        })
        .and_then(|m| m.with("tail", 9u8))
        .unwrap();

    let driver = BinaryDriver::default();
    let ctx = Context::at(3);
    let artifact = model.dump(&driver, &ctx).unwrap();
    // header is written at version 1: no flags
    assert_eq!(bytes(&artifact), [5, 7, 9]);

    let loaded = Model::load(Arc::clone(&packet), &driver, &artifact, &ctx).unwrap();
    let header = loaded.get("header").unwrap().into_owned();
    assert_eq!(
        header,
        Value::record([("kind", Value::from(7u8)), ("flags", Value::from(0u16))])
    );
    assert_eq!(loaded.get("tail").unwrap().as_u64(), Some(9));
    assert!(loaded.equals_at(&model, &ctx));

    let unpinned = Arc::new(
        ComponentStack::builder("packet")
            .field("id", Serializer::uint8())
            .field("header", packet.get("header").map(|c| c.payload().clone()).unwrap())
            .push(Component::new("tail", Serializer::uint8()).added_in(3))
            .build()
            .unwrap(),
    );
    let full = Model::from_record(unpinned, model.values().clone())
        .dump(&driver, &ctx)
        .unwrap();
    assert_eq!(bytes(&full), [5, 7, 0x01, 0x02, 9]);
}
