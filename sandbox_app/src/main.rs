//! Vulkan sandbox demo application
//!
//! Loads a terrain height map and an OBJ scene, then renders them with a
//! directional and a spot shadow map. F1 toggles the shadow depth debug
//! view, Space resets the camera, Escape quits.

use glfw::{Action, Key, WindowEvent};
use sandbox_engine::assets::{build_height_map_mesh, load_image, load_obj, ImageData};
use sandbox_engine::config::RendererConfig;
use sandbox_engine::foundation::math::{Mat4, Vec3};
use sandbox_engine::render::{NullOverlay, Renderer, SceneObject, Vertex, Window};
use std::time::Instant;

const CONFIG_PATH: &str = "sandbox.toml";
const ORBIT_RADIUS: f32 = 12.0;
const ORBIT_HEIGHT: f32 = 5.0;

struct SandboxApp {
    window: Window,
    renderer: Renderer,
    overlay: NullOverlay,
    start_time: Instant,
    orbit_camera: bool,
}

impl SandboxApp {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = RendererConfig::load(CONFIG_PATH)?;

        let mut window = Window::new(
            &config.window_title,
            config.window_width,
            config.window_height,
        )?;
        let renderer = Renderer::new(&mut window, config)?;

        Ok(Self {
            window,
            renderer,
            overlay: NullOverlay,
            start_time: Instant::now(),
            orbit_camera: true,
        })
    }

    fn load_scene(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.load_terrain();
        self.load_models();
        self.add_spot_light_marker()?;

        log::info!("Scene loaded ({} objects)", self.renderer.objects().len());
        Ok(())
    }

    fn load_terrain(&mut self) {
        let texture_dir = self.renderer.config().texture_dir.clone();
        let height_map = match load_image(format!("{}/terrain_height.png", texture_dir)) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("No terrain: {}", e);
                return;
            }
        };

        let diffuse = load_image(format!("{}/terrain_diffuse.png", texture_dir)).ok();
        let result = self
            .renderer
            .create_material([diffuse.as_ref(), None, None])
            .and_then(|material_id| {
                let source = build_height_map_mesh(&height_map);
                self.renderer.create_mesh(
                    &source.vertices,
                    &source.indices,
                    source.transform,
                    material_id,
                )
            });

        match result {
            Ok(mesh) => {
                let mut terrain = SceneObject::new("terrain", vec![mesh]);
                terrain.set_position(Vec3::new(0.0, 2.0, 0.0));
                self.renderer.add_object(terrain);
            }
            Err(e) => log::error!("Failed to upload terrain: {}", e),
        }
    }

    fn load_models(&mut self) {
        let texture_dir = self.renderer.config().texture_dir.clone();
        let model_path = format!("{}/scene.obj", self.renderer.config().object_dir);
        let sources = match load_obj(&model_path) {
            Ok(sources) => sources,
            Err(e) => {
                log::warn!("No scene model: {}", e);
                return;
            }
        };

        let mut meshes = Vec::new();
        for source in &sources {
            let channels = load_material_channels(&texture_dir, &source.material_paths);
            let result = self
                .renderer
                .create_material([
                    channels[0].as_ref(),
                    channels[1].as_ref(),
                    channels[2].as_ref(),
                ])
                .and_then(|material_id| {
                    self.renderer.create_mesh(
                        &source.vertices,
                        &source.indices,
                        source.transform,
                        material_id,
                    )
                });
            match result {
                Ok(mesh) => meshes.push(mesh),
                Err(e) => log::error!("Failed to upload mesh from {}: {}", model_path, e),
            }
        }

        if !meshes.is_empty() {
            self.renderer.add_object(SceneObject::new("scene", meshes));
        }
    }

    /// Small unlit cube marking the spot light position. It neither casts
    /// shadows nor receives lighting.
    fn add_spot_light_marker(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (vertices, indices) = unit_cube();
        let material_id = self.renderer.create_material([None, None, None])?;
        let mesh = self
            .renderer
            .create_mesh(&vertices, &indices, Mat4::identity(), material_id)?;

        let spot_position = self.renderer.light_mut().sl_position.xyz();
        let mut marker = SceneObject::new("spot_light_marker", vec![mesh]);
        marker.set_scale(Vec3::new(0.2, 0.2, 0.2));
        marker.set_position(spot_position);
        marker.set_casts_shadow(false);
        marker.set_shaded(false);
        self.renderer.add_object(marker);
        Ok(())
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while !self.window.should_close() {
            self.window.poll_events();

            let events: Vec<_> = self.window.flush_events().collect();
            for (_, event) in events {
                self.handle_event(event);
            }

            if self.orbit_camera {
                let elapsed = self.start_time.elapsed().as_secs_f32();
                let angle = elapsed * 0.25;
                self.renderer.camera_mut().set_position(Vec3::new(
                    angle.cos() * ORBIT_RADIUS,
                    ORBIT_HEIGHT,
                    angle.sin() * ORBIT_RADIUS,
                ));
            }

            self.renderer.draw(&self.window, &mut self.overlay)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Key(Key::Escape, _, Action::Press, _) => {
                self.window.set_should_close(true);
            }
            WindowEvent::Key(Key::F1, _, Action::Press, _) => {
                let settings = self.renderer.frag_settings_mut();
                settings.draw_shadow_depth = u32::from(settings.draw_shadow_depth == 0);
                log::info!(
                    "Shadow depth view: {}",
                    if settings.draw_shadow_depth != 0 { "on" } else { "off" }
                );
            }
            WindowEvent::Key(Key::Space, _, Action::Press, _) => {
                self.orbit_camera = !self.orbit_camera;
                if !self.orbit_camera {
                    let camera = self.renderer.camera_mut();
                    camera.set_position(Vec3::new(0.0, ORBIT_HEIGHT, ORBIT_RADIUS));
                    camera.look_at(Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));
                }
            }
            WindowEvent::FramebufferSize(width, height) => {
                if width > 0 && height > 0 {
                    self.renderer
                        .camera_mut()
                        .set_aspect_ratio(width as f32 / height as f32);
                }
            }
            _ => {}
        }
    }
}

fn load_material_channels(
    texture_dir: &str,
    paths: &[Option<String>; 3],
) -> [Option<ImageData>; 3] {
    let mut channels: [Option<ImageData>; 3] = [None, None, None];
    for (slot, path) in paths.iter().enumerate() {
        let Some(path) = path.as_ref().filter(|p| !p.is_empty()) else {
            continue;
        };
        match load_image(format!("{}/{}", texture_dir, path)) {
            Ok(image) => channels[slot] = Some(image),
            Err(e) => log::warn!("Skipping texture channel: {}", e),
        }
    }
    channels
}

fn unit_cube() -> (Vec<Vertex>, Vec<u32>) {
    let corners = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];
    let vertices = corners
        .iter()
        .map(|&position| {
            let length = f32::sqrt(3.0);
            Vertex {
                position,
                tex_coord: [0.0, 0.0],
                normal: [
                    position[0] / length,
                    position[1] / length,
                    position[2] / length,
                ],
            }
        })
        .collect();

    let indices = vec![
        0, 1, 2, 2, 3, 0, // back
        4, 6, 5, 6, 4, 7, // front
        0, 3, 7, 7, 4, 0, // left
        1, 5, 6, 6, 2, 1, // right
        3, 2, 6, 6, 7, 3, // top
        0, 4, 5, 5, 1, 0, // bottom
    ];

    (vertices, indices)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Vulkan sandbox");

    let mut app = SandboxApp::new()?;
    app.load_scene()?;
    app.run()?;

    log::info!("Sandbox finished");
    Ok(())
}
