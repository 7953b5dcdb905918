//! Cityscape demo
//!
//! Streams a procedural city through the headless device: one instanced
//! building mesh for the skyline, a render batch for the street tiles and a
//! per-frame uniform ring for the camera.

use cityscape_engine::cityscape::buffer::{MappedRingBuffer, RingBufferDesc, SectionCount};
use cityscape_engine::cityscape::graphics_device::{
    BufferTarget, BufferUsage, GraphicsDevice, HeadlessConfig, HeadlessGraphicsDevice, Shader, ShaderDesc,
};
use cityscape_engine::cityscape::log::LogSeverity;
use cityscape_engine::cityscape::render::RenderBatch;
use cityscape_engine::cityscape::resource::{Mesh, ResourcePool};
use cityscape_engine::cityscape::vertex::{InstanceData, VertexPositionColor, VertexPositionColorNormal};
use cityscape_engine::cityscape::{CityscapeError, CityscapeResult, Engine, StreamingConfig};
use glam::{Mat4, Vec3, Vec4};
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Instant;

const SOURCE: &str = "cityscape::Demo";
const GRID: i32 = 12;
const FRAMES: u32 = 180;
const STREET_TILE: f32 = 3.0;

struct Building {
    position: Vec3,
    height: f32,
    color: Vec4,
}

fn info(message: String) {
    Engine::log(LogSeverity::Info, SOURCE, message);
}

fn n(x: f32, y: f32, z: f32, normal: Vec3, color: Vec4) -> VertexPositionColorNormal {
    VertexPositionColorNormal::new(Vec3::new(x, y, z), color, normal)
}

/// Unit block on the ground plane: four walls and a roof
fn building_mesh(pool: &Arc<Mutex<ResourcePool>>) -> CityscapeResult<Mesh<VertexPositionColorNormal>> {
    let wall = Vec4::new(0.7, 0.7, 0.75, 1.0);
    let roof = Vec4::new(0.3, 0.3, 0.35, 1.0);
    let mut mesh = Mesh::new(pool, true)?;
    mesh.add_quad(
        n(-0.5, 1.0, 0.5, Vec3::Z, wall), n(0.5, 1.0, 0.5, Vec3::Z, wall),
        n(-0.5, 0.0, 0.5, Vec3::Z, wall), n(0.5, 0.0, 0.5, Vec3::Z, wall),
    )?;
    mesh.add_quad(
        n(0.5, 1.0, -0.5, Vec3::NEG_Z, wall), n(-0.5, 1.0, -0.5, Vec3::NEG_Z, wall),
        n(0.5, 0.0, -0.5, Vec3::NEG_Z, wall), n(-0.5, 0.0, -0.5, Vec3::NEG_Z, wall),
    )?;
    mesh.add_quad(
        n(0.5, 1.0, 0.5, Vec3::X, wall), n(0.5, 1.0, -0.5, Vec3::X, wall),
        n(0.5, 0.0, 0.5, Vec3::X, wall), n(0.5, 0.0, -0.5, Vec3::X, wall),
    )?;
    mesh.add_quad(
        n(-0.5, 1.0, -0.5, Vec3::NEG_X, wall), n(-0.5, 1.0, 0.5, Vec3::NEG_X, wall),
        n(-0.5, 0.0, -0.5, Vec3::NEG_X, wall), n(-0.5, 0.0, 0.5, Vec3::NEG_X, wall),
    )?;
    mesh.add_quad(
        n(-0.5, 1.0, -0.5, Vec3::Y, roof), n(0.5, 1.0, -0.5, Vec3::Y, roof),
        n(-0.5, 1.0, 0.5, Vec3::Y, roof), n(0.5, 1.0, 0.5, Vec3::Y, roof),
    )?;
    mesh.commit()?;
    Ok(mesh)
}

fn street_tile(pool: &Arc<Mutex<ResourcePool>>, x: f32, z: f32, lit: bool) -> CityscapeResult<Mesh<VertexPositionColor>> {
    let asphalt = if lit { Vec4::new(0.35, 0.35, 0.3, 1.0) } else { Vec4::new(0.2, 0.2, 0.2, 1.0) };
    let half = STREET_TILE * 0.5;
    let p = |dx: f32, dz: f32| VertexPositionColor::new(Vec3::new(x + dx, 0.0, z + dz), asphalt);
    let mut mesh = Mesh::new(pool, true)?;
    mesh.add_quad(p(-half, -half), p(half, -half), p(-half, half), p(half, half))?;
    Ok(mesh)
}

fn generate_city() -> Vec<Building> {
    let mut rng = rand::thread_rng();
    let mut buildings = Vec::new();
    for gx in -GRID / 2..GRID / 2 {
        for gz in -GRID / 2..GRID / 2 {
            if rng.gen_bool(0.2) {
                continue;
            }
            let shade = rng.gen_range(0.6..1.0);
            buildings.push(Building {
                position: Vec3::new(gx as f32 * STREET_TILE, 0.0, gz as f32 * STREET_TILE),
                height: rng.gen_range(1.0..12.0),
                color: Vec4::new(shade, shade, rng.gen_range(0.7..1.0), 1.0),
            });
        }
    }
    buildings
}

fn create_shader(device: &Arc<Mutex<HeadlessGraphicsDevice>>, name: &str) -> CityscapeResult<Arc<dyn Shader>> {
    let mut device = device.lock()
        .map_err(|_| CityscapeError::BackendError("device mutex poisoned".to_string()))?;
    device.create_shader(ShaderDesc {
        name: name.to_string(),
        vertex_source: format!("{}.vert", name),
        fragment_source: format!("{}.frag", name),
        uniform_blocks: Vec::new(),
    })
}

fn run() -> CityscapeResult<()> {
    // The frame loop runs unattended; only stats are read back
    let headless = Arc::new(Mutex::new(HeadlessGraphicsDevice::with_config(HeadlessConfig {
        label: "cityscape-demo".to_string(),
        command_log_capacity: 0,
        ..HeadlessConfig::default()
    })));
    let device: Arc<Mutex<dyn GraphicsDevice>> = headless.clone();
    let config = StreamingConfig::default().with_instance_capacity((GRID * GRID) as u32);
    let pool = ResourcePool::new(device.clone(), config).into_shared();

    let building_shader = create_shader(&headless, "building")?;
    let street_shader = create_shader(&headless, "street")?;

    let buildings = generate_city();
    let mut block = building_mesh(&pool)?;
    let mut streets: RenderBatch<VertexPositionColor> = RenderBatch::new(device.clone(), &config, 256, 384)?;
    let mut camera = MappedRingBuffer::new(
        device.clone(),
        RingBufferDesc::dynamic("camera", SectionCount::Triple, 256, BufferUsage::UNIFORM),
    )?;

    info(format!("City generated: {} buildings on a {}x{} grid", buildings.len(), GRID, GRID));

    let start = Instant::now();
    let mut last = start;
    for frame in 0..FRAMES {
        let now = Instant::now();
        let delta = now.duration_since(last).as_secs_f32();
        last = now;

        // ========== CAMERA ==========
        let angle = frame as f32 * 0.02;
        let eye = Vec3::new(angle.cos() * 40.0, 25.0, angle.sin() * 40.0);
        let view_projection = Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.1, 200.0)
            * Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        camera.write(&view_projection.to_cols_array())?;
        camera.write(&[eye.x, eye.y, eye.z, delta])?;
        let camera_bytes = camera.offset();
        camera.flush(true)?;
        camera.bind_range(BufferTarget::Uniform, 0, 0, camera_bytes)?;

        // ========== SKYLINE ==========
        let sway = (frame as f32 * 0.05).sin() * 0.02;
        let instances: Vec<InstanceData> = buildings.iter().map(|b| {
            let model = Mat4::from_translation(b.position)
                * Mat4::from_rotation_y(sway)
                * Mat4::from_scale(Vec3::new(2.0, b.height, 2.0));
            InstanceData::new(model, b.color)
        }).collect();
        block.draw_instances(&building_shader, &instances)?;

        // ========== STREETS ==========
        let lit_column = (frame / 10) as i32 % GRID - GRID / 2;
        for gx in -GRID / 2..GRID / 2 {
            for gz in -GRID / 2..GRID / 2 {
                let tile = street_tile(
                    &pool,
                    gx as f32 * STREET_TILE + STREET_TILE * 0.5,
                    gz as f32 * STREET_TILE + STREET_TILE * 0.5,
                    gx == lit_column,
                )?;
                streets.submit(&tile, &street_shader)?;
            }
        }
        streets.flush(&street_shader)?;

        camera.lock()?;
        camera.swap_sections();

        if frame % 60 == 59 {
            let batch = streets.frame_stats();
            info(format!(
                "Frame {}: street batch {} draws / {} vertices, frame time {:.3} ms",
                frame + 1, batch.draw_calls, batch.vertices, delta * 1000.0,
            ));
            streets.reset_frame_stats();
        }
    }

    let elapsed = start.elapsed().as_secs_f32();
    let stats = headless.lock()
        .map_err(|_| CityscapeError::BackendError("device mutex poisoned".to_string()))?
        .stats();
    info(format!(
        "{} frames in {:.2} s: {} draw calls, {} instances, {} fences, {} pending fence polls",
        FRAMES, elapsed, stats.draw_calls, stats.instances_drawn, stats.fences_inserted, stats.fence_polls,
    ));

    block.reset();
    Ok(())
}

fn main() {
    Engine::set_min_severity(LogSeverity::Info);
    if let Err(e) = run() {
        Engine::log(LogSeverity::Error, SOURCE, format!("Demo failed: {}", e));
        std::process::exit(1);
    }
}
