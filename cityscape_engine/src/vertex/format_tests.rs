use super::*;

#[test]
fn test_attribute_components() {
    assert_eq!(AttributeKind::Position.components(), 3);
    assert_eq!(AttributeKind::Color.components(), 4);
    assert_eq!(AttributeKind::Normal.components(), 3);
    assert_eq!(AttributeKind::Uv.components(), 2);
}

#[test]
fn test_strides_of_recognized_formats() {
    assert_eq!(VertexFormat::Position.stride(), 12);
    assert_eq!(VertexFormat::PositionColor.stride(), 28);
    assert_eq!(VertexFormat::PositionColorNormal.stride(), 40);
    assert_eq!(VertexFormat::PositionColorNormalUv.stride(), 48);
    assert_eq!(VertexFormat::PositionColorNormalUv2.stride(), 56);
    assert_eq!(VertexFormat::PositionColorUv.stride(), 36);
    assert_eq!(VertexFormat::PositionNormal.stride(), 24);
    assert_eq!(VertexFormat::PositionNormalUv.stride(), 32);
    assert_eq!(VertexFormat::PositionUv.stride(), 20);
}

#[test]
fn test_offsets_follow_fixed_order() {
    assert_eq!(VertexFormat::PositionColorNormalUv2.offsets(), vec![0, 12, 28, 40, 48]);
    assert_eq!(VertexFormat::PositionNormalUv.offsets(), vec![0, 12, 24]);
    assert_eq!(VertexFormat::Position.offsets(), vec![0]);
}

#[test]
fn test_custom_format_has_no_attributes() {
    let custom = VertexFormat::Custom { stride: 20 };
    assert!(custom.is_custom());
    assert!(custom.attributes().is_empty());
    assert_eq!(custom.stride(), 20);
    assert!(!VertexFormat::RECOGNIZED.iter().any(|f| f.is_custom()));
}

#[test]
fn test_struct_sizes_match_format_strides() {
    fn check<V: Vertex>() {
        assert_eq!(std::mem::size_of::<V>() as u32, V::FORMAT.stride(), "{:?}", V::FORMAT);
    }
    check::<VertexPosition>();
    check::<VertexPositionColor>();
    check::<VertexPositionColorNormal>();
    check::<VertexPositionColorNormalUv>();
    check::<VertexPositionColorNormalUv2>();
    check::<VertexPositionColorUv>();
    check::<VertexPositionNormal>();
    check::<VertexPositionNormalUv>();
    check::<VertexPositionUv>();
}

#[test]
fn test_vertex_bytes_are_interleaved() {
    let vertex = VertexPositionColor::new(Vec3::new(1.0, 2.0, 3.0), Vec4::new(0.1, 0.2, 0.3, 1.0));
    let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&vertex));
    assert_eq!(floats, &[1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 1.0]);
}

#[test]
fn test_instance_data_layout() {
    assert_eq!(std::mem::size_of::<InstanceData>(), 80);
    let instance = InstanceData::at(Vec3::new(4.0, 0.0, -2.0));
    assert_eq!(instance.model[3], [4.0, 0.0, -2.0, 1.0]);
    assert_eq!(instance.color, [1.0; 4]);
}
