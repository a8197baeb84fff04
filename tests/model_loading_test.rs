use std::rc::Rc;

use pbr_viewer::data_structures::model::{Model, TextureSlot};
use pbr_viewer::data_structures::scene_graph::LoadError;
use pbr_viewer::gpu::mock::MockTexture;
use pbr_viewer::gpu::{MockGpu, PixelFormat};
use pbr_viewer::resources::defaults::DefaultTextures;
use pbr_viewer::resources::postprocess::PostProcess;
use pbr_viewer::{LoadOptions, load_model, try_load_model};

use crate::common::test_utils::{
    Attributes, GltfBuilder, TWO_QUADS_MTL, TWO_QUADS_OBJ, TestDir, write_obj, write_png,
    write_rgb_png,
};

mod common;

fn slots(model: &Model<MockGpu>, mesh: usize) -> Vec<TextureSlot> {
    model.meshes[mesh].textures.iter().map(|t| t.slot).collect()
}

fn assert_indices_in_bounds(model: &Model<MockGpu>) {
    for mesh in &model.meshes {
        assert_eq!(mesh.indices.len() % 3, 0, "{} is not a triangle list", mesh.name);
        for &index in &mesh.indices {
            assert!((index as usize) < mesh.vertices.len(), "{} out of bounds", index);
        }
    }
}

#[test]
fn single_diffuse_texture_is_bound_as_albedo() {
    let dir = TestDir::new("single-diffuse");
    write_png(&dir.models().join("tex/a.png"), 64, 64, 3);

    let mut gltf = GltfBuilder::new();
    let texture = gltf.image_uri("tex/a.png");
    let material = gltf.base_color_material(texture);
    let mesh = gltf.triangle(Attributes::TEXTURED, Some(material));
    let node = gltf.node(Some(mesh), &[]);
    gltf.scene(&[node]);
    let path = gltf.write_gltf(&dir.models(), "single");

    let gpu = MockGpu::new();
    let model = try_load_model(&path, &gpu, None, &dir.options()).unwrap();

    assert_eq!(model.meshes.len(), 1);
    assert_eq!(slots(&model, 0), vec![TextureSlot::Albedo]);
    let albedo = &model.meshes[0].textures[0];
    assert_eq!(albedo.path, "tex/a.png");
    let uploaded = gpu.texture(albedo.handle.unwrap()).unwrap();
    assert_eq!((uploaded.width, uploaded.height), (64, 64));
    assert_eq!(uploaded.format, PixelFormat::Rgb8);
    assert_eq!(uploaded.mip_levels, 7);

    let bindings = model.meshes[0].bindings(true);
    assert!(bindings.has(TextureSlot::Albedo));
    assert!(!bindings.has(TextureSlot::Normal));
    assert!(!bindings.has(TextureSlot::Metallic));
    assert_indices_in_bounds(&model);
}

fn single_channel(gpu: &MockGpu, model: &Model<MockGpu>, slot: TextureSlot) -> MockTexture {
    let texture = model.meshes[0]
        .textures
        .iter()
        .find(|t| t.slot == slot)
        .unwrap_or_else(|| panic!("{:?} not bound", slot));
    let uploaded = gpu.texture(texture.handle.unwrap()).unwrap();
    assert_eq!(uploaded.format, PixelFormat::R8);
    uploaded
}

#[test]
fn metallic_roughness_is_split_into_two_slots() {
    let dir = TestDir::new("metallic-roughness");
    write_rgb_png(&dir.models().join("tex/mr.png"), 4, 2, [7, 120, 230]);

    let mut gltf = GltfBuilder::new();
    let texture = gltf.image_uri("tex/mr.png");
    let material = gltf.metallic_roughness_material(texture);
    let mesh = gltf.triangle(Attributes::TEXTURED, Some(material));
    let node = gltf.node(Some(mesh), &[]);
    gltf.scene(&[node]);
    let path = gltf.write_gltf(&dir.models(), "packed");

    let gpu = MockGpu::new();
    let model = try_load_model(&path, &gpu, None, &dir.options()).unwrap();

    let bindings = model.meshes[0].bindings(true);
    assert!(bindings.has(TextureSlot::Metallic));
    assert!(bindings.has(TextureSlot::Roughness));
    assert!(!bindings.has(TextureSlot::Albedo));

    let metallic = single_channel(&gpu, &model, TextureSlot::Metallic);
    let roughness = single_channel(&gpu, &model, TextureSlot::Roughness);
    assert_eq!((metallic.width, metallic.height), (4, 2));
    assert!(metallic.pixels.iter().all(|&p| p == 230));
    assert!(roughness.pixels.iter().all(|&p| p == 120));
    assert_eq!(gpu.live_textures(), 2);
}

#[test]
fn shared_packed_image_is_split_once() {
    let dir = TestDir::new("metallic-roughness-glb");
    let mut gltf = GltfBuilder::new();
    let texture = gltf.embedded_rgb_png(2, 2, [0, 64, 255]);
    let material = gltf.metallic_roughness_material(texture);
    let first = gltf.triangle(Attributes::TEXTURED, Some(material));
    let second = gltf.triangle(Attributes::TEXTURED, Some(material));
    let a = gltf.node(Some(first), &[]);
    let b = gltf.node(Some(second), &[]);
    let root = gltf.node(None, &[a, b]);
    gltf.scene(&[root]);
    let path = gltf.write_glb(&dir.models(), "packed");

    let gpu = MockGpu::new();
    let model = try_load_model(&path, &gpu, None, &dir.options()).unwrap();

    assert_eq!(model.meshes.len(), 2);
    for mesh in 0..2 {
        let paths: Vec<&str> = model.meshes[mesh].textures.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["*1", "*2"]);
    }
    assert!(single_channel(&gpu, &model, TextureSlot::Metallic).pixels.iter().all(|&p| p == 255));
    assert!(single_channel(&gpu, &model, TextureSlot::Roughness).pixels.iter().all(|&p| p == 64));
    assert_eq!(gpu.textures_created(), 2);
}

#[test]
fn embedded_textures_load_from_glb() {
    let dir = TestDir::new("glb-embedded");
    let mut gltf = GltfBuilder::new();
    let texture = gltf.embedded_png(8, 4, 4);
    let material = gltf.base_color_material(texture);
    let mesh = gltf.triangle(Attributes::TEXTURED, Some(material));
    let node = gltf.node(Some(mesh), &[]);
    gltf.scene(&[node]);
    let path = gltf.write_glb(&dir.models(), "embedded");

    let gpu = MockGpu::new();
    let model = try_load_model(&path, &gpu, None, &dir.options()).unwrap();

    assert_eq!(slots(&model, 0), vec![TextureSlot::Albedo]);
    assert_eq!(model.meshes[0].textures[0].path, "*0");
    let uploaded = gpu.texture(model.meshes[0].textures[0].handle.unwrap()).unwrap();
    assert_eq!((uploaded.width, uploaded.height), (8, 4));
    assert_eq!(uploaded.format, PixelFormat::Rgba8);
}

#[test]
fn material_without_textures_and_no_defaults_binds_nothing() {
    let dir = TestDir::new("nothing-bound");
    let mut gltf = GltfBuilder::new();
    let material = gltf.material("");
    let mesh = gltf.triangle(Attributes::FULL, Some(material));
    let node = gltf.node(Some(mesh), &[]);
    gltf.scene(&[node]);
    let path = gltf.write_gltf(&dir.models(), "bare");

    let gpu = MockGpu::new();
    let defaults = DefaultTextures::shared(gpu.clone(), dir.search());
    let model = try_load_model(&path, &gpu, Some(defaults), &dir.options()).unwrap();

    assert!(model.meshes[0].textures.is_empty());
    let bindings = model.meshes[0].bindings(true);
    for slot in TextureSlot::BOUND {
        assert!(!bindings.has(slot), "{slot} should be unbound");
    }
    assert_eq!(gpu.live_textures(), 0);
}

#[test]
fn meshes_without_textures_share_the_default_set() {
    let dir = TestDir::new("defaults");
    dir.install_default_assets();

    let mut gltf = GltfBuilder::new();
    let material = gltf.material("");
    let first = gltf.triangle(Attributes::FULL, Some(material));
    let second = gltf.triangle(Attributes::POSITIONS_ONLY, None);
    let a = gltf.node(Some(first), &[]);
    let b = gltf.node(Some(second), &[]);
    let root = gltf.node(None, &[a, b]);
    gltf.scene(&[root]);
    let path = gltf.write_gltf(&dir.models(), "defaults");

    let gpu = MockGpu::new();
    let defaults = DefaultTextures::shared(gpu.clone(), dir.search());
    let model = try_load_model(&path, &gpu, Some(defaults.clone()), &dir.options()).unwrap();

    let expected = defaults.get();
    assert_eq!(expected.len(), 4);
    for mesh in &model.meshes {
        assert_eq!(mesh.textures.len(), expected.len());
        for (actual, expected) in mesh.textures.iter().zip(expected) {
            assert!(Rc::ptr_eq(actual, expected));
        }
    }
    // Loaded once for the whole model.
    assert_eq!(gpu.textures_created(), 4);
    assert!(model.textures.is_empty());
}

#[test]
fn normal_map_is_dropped_without_tangent_space() {
    let dir = TestDir::new("normal-suppressed");
    write_png(&dir.models().join("bumps_normal.png"), 4, 4, 3);

    let mut gltf = GltfBuilder::new();
    let texture = gltf.image_uri("bumps_normal.png");
    let material = gltf.material(&format!(r#""normalTexture": {{"index": {texture}}}"#));
    let flat = gltf.triangle(Attributes::POSITIONS_ONLY, Some(material));
    let mapped = gltf.triangle(Attributes::FULL, Some(material));
    let a = gltf.node(Some(flat), &[]);
    let b = gltf.node(Some(mapped), &[]);
    gltf.scene(&[a, b]);
    let path = gltf.write_gltf(&dir.models(), "normals");

    let gpu = MockGpu::new();
    let model = try_load_model(&path, &gpu, None, &dir.options()).unwrap();

    assert_eq!(model.meshes.len(), 2);
    let flat = &model.meshes[0];
    assert!(!flat.has_tangent_space);
    assert!(flat.textures.iter().all(|t| t.slot != TextureSlot::Normal));
    assert!(!flat.bindings(true).use_tangent_space);
    for vertex in &flat.vertices {
        assert_eq!(vertex.tangent, [0.0; 3]);
        assert_eq!(vertex.bitangent, [0.0; 3]);
        assert_eq!(vertex.tex_coords, [0.0; 2]);
    }

    let mapped = &model.meshes[1];
    assert!(mapped.has_tangent_space);
    assert_eq!(slots(&model, 1), vec![TextureSlot::Normal]);
    assert!(mapped.bindings(true).has(TextureSlot::Normal));
    // Asking for no tangent space keeps the texture but switches the flag off.
    assert!(!mapped.bindings(false).use_tangent_space);
}

#[test]
fn tangent_space_requires_uvs_tangents_and_bitangents() {
    let dir = TestDir::new("tangent-space");
    let mut gltf = GltfBuilder::new();
    let textured = gltf.triangle(Attributes::TEXTURED, None);
    let full = gltf.triangle(Attributes::FULL, None);
    let a = gltf.node(Some(textured), &[]);
    let b = gltf.node(Some(full), &[]);
    gltf.scene(&[a, b]);
    let path = gltf.write_gltf(&dir.models(), "tangents");

    let gpu = MockGpu::new();
    let raw = LoadOptions {
        post: PostProcess::NONE,
        ..dir.options()
    };
    let model = try_load_model(&path, &gpu, None, &raw).unwrap();
    assert!(!model.meshes[0].has_tangent_space);
    assert!(model.meshes[0].vertices.iter().all(|v| v.tangent == [0.0; 3]));
    assert!(model.meshes[1].has_tangent_space);
    assert!(model.meshes[1].vertices.iter().all(|v| v.tangent == [1.0, 0.0, 0.0]));

    // With post-processing, tangents are generated for anything with UVs.
    let model = try_load_model(&path, &gpu, None, &dir.options()).unwrap();
    assert!(model.meshes.iter().all(|mesh| mesh.has_tangent_space));
}

#[test]
fn siblings_share_one_texture_upload() {
    let dir = TestDir::new("shared-obj");
    write_png(&dir.models().join("tex/wood_diffuse.png"), 16, 16, 4);
    let path = write_obj(
        &dir.models(),
        "scene.obj",
        TWO_QUADS_OBJ,
        Some(("scene.mtl", TWO_QUADS_MTL)),
    );

    let gpu = MockGpu::new();
    let model = try_load_model(&path, &gpu, None, &dir.options()).unwrap();

    assert_eq!(model.meshes.len(), 2);
    assert!(Rc::ptr_eq(&model.meshes[0].textures[0], &model.meshes[1].textures[0]));
    assert_eq!(
        model.meshes[0].textures[0].handle,
        model.meshes[1].textures[0].handle
    );
    assert_eq!(gpu.textures_created(), 1);
    assert_eq!(model.textures.len(), 1);
    // Quads come out as two triangles each.
    assert!(model.meshes.iter().all(|mesh| mesh.indices.len() == 6));
    assert_indices_in_bounds(&model);
}

#[test]
fn nested_nodes_are_visited_in_pre_order() {
    let dir = TestDir::new("pre-order");
    let mut gltf = GltfBuilder::new();
    let meshes: Vec<usize> = (0..3)
        .map(|_| gltf.triangle(Attributes::POSITIONS_ONLY, None))
        .collect();
    let grandchild = gltf.node(Some(meshes[2]), &[]);
    let child = gltf.node(Some(meshes[1]), &[grandchild]);
    let root = gltf.node(Some(meshes[0]), &[child]);
    gltf.scene(&[root]);
    let path = gltf.write_gltf(&dir.models(), "nested");

    let gpu = MockGpu::new();
    let model = try_load_model(&path, &gpu, None, &dir.options()).unwrap();
    let names: Vec<&str> = model.meshes.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["tri0", "tri1", "tri2"]);
    assert_eq!(gpu.live_mesh_buffers(), 3);
}

#[test]
fn broken_file_yields_an_empty_model() {
    let dir = TestDir::new("broken");
    let path = dir.models().join("broken.gltf");
    std::fs::write(&path, "{ not json").unwrap();

    let gpu = MockGpu::new();
    assert!(matches!(
        try_load_model(&path, &gpu, None, &dir.options()),
        Err(LoadError::NoScene { .. })
    ));
    let model = load_model(&path, &gpu, None, &dir.options());
    assert!(model.is_empty());
    assert_eq!(gpu.live_textures(), 0);
}

#[test]
fn dropping_the_model_releases_everything_but_defaults() {
    let dir = TestDir::new("release");
    dir.install_default_assets();
    write_png(&dir.models().join("tex/wood_diffuse.png"), 4, 4, 3);
    let path = write_obj(
        &dir.models(),
        "scene.obj",
        TWO_QUADS_OBJ,
        Some(("scene.mtl", TWO_QUADS_MTL)),
    );

    let gpu = MockGpu::new();
    let defaults = DefaultTextures::shared(gpu.clone(), dir.search());
    defaults.get();
    let model = load_model(&path, &gpu, Some(defaults.clone()), &dir.options());
    assert_eq!(gpu.live_textures(), 5);

    drop(model);
    assert_eq!(gpu.live_textures(), 4);
    assert_eq!(gpu.live_mesh_buffers(), 0);
    drop(defaults);
    assert_eq!(gpu.live_textures(), 0);
}
