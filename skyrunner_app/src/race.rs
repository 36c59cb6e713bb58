//! The race: GPU scene, per-frame uniforms and draw recording

use ash::vk;
use skyrunner_core::assets::{assemble, Geometry, GeometrySource};
use skyrunner_core::config::ConfigError;
use skyrunner_core::core::config::{DescriptorPoolConfig, RendererConfig};
use skyrunner_core::foundation::math::{axis_rotation, Mat4, Vec3};
use skyrunner_core::render::frame::{FrameBackend, RenderQueue};
use skyrunner_core::render::vulkan::{
    record_queue, CommandRecorder, DescriptorElement, DescriptorPool, DescriptorSet,
    DescriptorSetLayout, DescriptorSetLayoutBuilder, DrawItem, Model, Pipeline, SamplerSettings,
    ShaderModule, Texture, VertexDescriptor, VulkanContext, VulkanRenderer,
};
use skyrunner_core::simulation::{FrameTransforms, WorldProbe};
use skyrunner_core::{AppError, Application};

use crate::course::Course;
use crate::loaders;
use crate::settings::{GameConfig, GameSettings};
use crate::shapes;
use crate::vertex::{
    CrystalUniform, CrystalVertex, HudUniform, HudVertex, LightUniform, MeshUniform, MeshVertex,
    SkyUniform, SkyVertex, VertexLayouts,
};

const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

const SUN_POSITION: [f32; 3] = [-60.0, 30.0, -90.0];
const SUN_COLOR: [f32; 3] = [1.0, 0.95, 0.85];
const CRYSTAL_COLOR: [f32; 4] = [0.3, 0.9, 1.0, 0.65];

const BOOST_ICON_SIZE: f32 = 0.25;
const BOOST_ICON_MARGIN: f32 = 0.05;

// Uniform binding numbers, mirrored in the shaders
const SKY_VIEW: u32 = 0;
const MESH_TRANSFORM: u32 = 0;
const MESH_LIGHT: u32 = 2;
const CRYSTAL_TRANSFORM: u32 = 0;
const CRYSTAL_SHADING: u32 = 1;
const HUD_RECT: u32 = 0;

fn uniform<T>() -> DescriptorElement<'static> {
    DescriptorElement::Uniform {
        size: std::mem::size_of::<T>() as u64,
    }
}

/// Per-frame descriptors the scene allocates for a course
fn descriptor_demand(asteroids: usize, crystals: usize) -> DescriptorPoolConfig {
    let (asteroids, crystals) = (asteroids as u32, crystals as u32);
    // sky + ship + asteroids + crystals + hud
    DescriptorPoolConfig {
        uniform_blocks: 1 + 2 + 2 * asteroids + 2 * crystals + 1,
        textures: 1 + 1 + asteroids + 1,
        sets: 1 + 1 + asteroids + crystals + 1,
    }
}

fn check_pool(
    demand: &DescriptorPoolConfig,
    available: &DescriptorPoolConfig,
) -> Result<(), ConfigError> {
    if demand.uniform_blocks > available.uniform_blocks
        || demand.textures > available.textures
        || demand.sets > available.sets
    {
        return Err(ConfigError::Invalid {
            field: "renderer.descriptor_pool",
            reason: format!("course needs {demand:?}, pool holds {available:?}"),
        });
    }
    Ok(())
}

/// Descriptor set layouts, one per pipeline
struct SetLayouts {
    sky: DescriptorSetLayout,
    mesh: DescriptorSetLayout,
    crystal: DescriptorSetLayout,
    hud: DescriptorSetLayout,
}

impl SetLayouts {
    fn new(context: &VulkanContext) -> Result<Self, AppError> {
        let vertex = vk::ShaderStageFlags::VERTEX;
        let fragment = vk::ShaderStageFlags::FRAGMENT;

        Ok(Self {
            sky: DescriptorSetLayoutBuilder::new()
                .add_uniform_buffer(SKY_VIEW, vertex)
                .add_texture(1, fragment)
                .build(context)?,
            mesh: DescriptorSetLayoutBuilder::new()
                .add_uniform_buffer(MESH_TRANSFORM, vertex)
                .add_texture(1, fragment)
                .add_uniform_buffer(MESH_LIGHT, fragment)
                .build(context)?,
            crystal: DescriptorSetLayoutBuilder::new()
                .add_uniform_buffer(CRYSTAL_TRANSFORM, vertex)
                .add_uniform_buffer(CRYSTAL_SHADING, fragment)
                .build(context)?,
            hud: DescriptorSetLayoutBuilder::new()
                .add_uniform_buffer(HUD_RECT, vertex | fragment)
                .add_texture(1, fragment)
                .build(context)?,
        })
    }
}

struct Pipelines {
    sky: Pipeline,
    mesh: Pipeline,
    crystal: Pipeline,
    hud: Pipeline,
}

impl Pipelines {
    fn new(
        context: &VulkanContext,
        renderer: &VulkanRenderer<'_>,
        config: &RendererConfig,
        vertex: &VertexLayouts,
        layouts: &SetLayouts,
    ) -> Result<Self, AppError> {
        let load = |vertex_layout: &VertexDescriptor,
                    name: &str,
                    set_layout: &DescriptorSetLayout| {
            let shader = |stage: &str| {
                ShaderModule::from_file(context, config.shader_path(&format!("{name}.{stage}.spv")))
            };
            let vert = shader("vert")?;
            let frag = shader("frag")?;
            Ok::<_, AppError>(Pipeline::new(context, vertex_layout, vert, frag, &[set_layout]))
        };

        let mut pipelines = Self {
            sky: load(&vertex.sky, "sky", &layouts.sky)?,
            mesh: load(&vertex.mesh, "mesh", &layouts.mesh)?,
            crystal: load(&vertex.crystal, "crystal", &layouts.crystal)?,
            hud: load(&vertex.hud, "hud", &layouts.hud)?,
        };

        // The sky is drawn at the far plane from inside the cube
        pipelines.sky.set_advanced_features(
            vk::CompareOp::LESS_OR_EQUAL,
            vk::PolygonMode::FILL,
            vk::CullModeFlags::NONE,
            false,
        );
        pipelines.crystal.set_advanced_features(
            vk::CompareOp::LESS,
            vk::PolygonMode::FILL,
            vk::CullModeFlags::BACK,
            true,
        );
        pipelines.hud.set_advanced_features(
            vk::CompareOp::ALWAYS,
            vk::PolygonMode::FILL,
            vk::CullModeFlags::NONE,
            true,
        );

        pipelines.create(renderer)?;
        Ok(pipelines)
    }

    fn create(&mut self, renderer: &VulkanRenderer<'_>) -> Result<(), AppError> {
        for pipeline in [&mut self.sky, &mut self.mesh, &mut self.crystal, &mut self.hud] {
            renderer.create_pipeline(pipeline)?;
        }
        Ok(())
    }
}

struct Models {
    sky: Model<SkyVertex>,
    ship: Model<MeshVertex>,
    asteroid: Model<MeshVertex>,
    crystal: Model<CrystalVertex>,
    hud: Model<HudVertex>,
}

impl Models {
    fn new(
        context: &VulkanContext,
        vertex: &VertexLayouts,
        game: &GameConfig,
    ) -> Result<Self, AppError> {
        fn upload<V: bytemuck::Pod>(
            context: &VulkanContext,
            layout: &VertexDescriptor,
            source: &GeometrySource,
        ) -> Result<Model<V>, AppError> {
            let geometry: Geometry<V> = assemble(layout, source)?;
            Ok(Model::new(context, layout, &geometry)?)
        }

        Ok(Self {
            sky: upload(context, &vertex.sky, &shapes::cube())?,
            ship: upload(context, &vertex.mesh, &ship_source(game))?,
            asteroid: upload(context, &vertex.mesh, &asteroid_source(game))?,
            crystal: upload(context, &vertex.crystal, &shapes::crystal())?,
            hud: upload(context, &vertex.hud, &shapes::unit_quad())?,
        })
    }

    /// Re-read the ship and asteroid meshes into their existing models
    fn reload(
        &mut self,
        context: &VulkanContext,
        vertex: &VertexLayouts,
        game: &GameConfig,
    ) -> Result<(), AppError> {
        let ship: Geometry<MeshVertex> = assemble(&vertex.mesh, &ship_source(game))?;
        let asteroid: Geometry<MeshVertex> = assemble(&vertex.mesh, &asteroid_source(game))?;
        self.ship.reload(context, &ship)?;
        self.asteroid.reload(context, &asteroid)?;
        log::info!(
            "Reloaded meshes: ship {} vertices, asteroid {} vertices",
            self.ship.vertex_count(),
            self.asteroid.vertex_count()
        );
        Ok(())
    }
}

fn ship_source(game: &GameConfig) -> GeometrySource {
    loaders::load_obj_or(game.model_path("ship.obj"), shapes::dart)
}

fn asteroid_source(game: &GameConfig) -> GeometrySource {
    loaders::load_obj_or(game.model_path("asteroid.obj"), || shapes::uv_sphere(12, 24))
}

struct Textures {
    sky: Texture,
    ship: Texture,
    asteroid: Texture,
    boost: Texture,
}

impl Textures {
    fn new(context: &VulkanContext, game: &GameConfig) -> Result<Self, AppError> {
        let texture_2d = |name: &str, fallback: [u8; 4]| {
            let pixels = loaders::load_image_or(game.texture_path(name), fallback);
            Texture::new_2d(context, &pixels, COLOR_FORMAT, SamplerSettings::default())
        };
        let sky = loaders::load_cubemap_or(game.texture_dir(), "sky", [4, 4, 16, 255]);

        Ok(Self {
            sky: Texture::new_cubemap(context, &sky, COLOR_FORMAT, SamplerSettings::skybox())?,
            ship: texture_2d("ship.png", [200, 200, 210, 255])?,
            asteroid: texture_2d("asteroid.png", [110, 95, 80, 255])?,
            boost: texture_2d("boost.png", [255, 180, 40, 255])?,
        })
    }
}

/// Descriptor sets, one per drawn object
struct ObjectSets {
    sky: DescriptorSet,
    ship: DescriptorSet,
    asteroids: Vec<DescriptorSet>,
    crystals: Vec<DescriptorSet>,
    hud: DescriptorSet,
}

impl ObjectSets {
    fn new(
        context: &VulkanContext,
        pool: &DescriptorPool,
        layouts: &SetLayouts,
        textures: &Textures,
        course: &Course,
    ) -> Result<Self, AppError> {
        let mesh_set = |texture: &Texture| {
            DescriptorSet::new(
                context,
                pool,
                &layouts.mesh,
                &[
                    uniform::<MeshUniform>(),
                    DescriptorElement::Texture(texture),
                    uniform::<LightUniform>(),
                ],
            )
        };

        let asteroids = course
            .asteroids()
            .iter()
            .map(|_| mesh_set(&textures.asteroid))
            .collect::<Result<Vec<_>, _>>()?;
        let crystals = course
            .crystals()
            .iter()
            .map(|_| {
                DescriptorSet::new(
                    context,
                    pool,
                    &layouts.crystal,
                    &[uniform::<MeshUniform>(), uniform::<CrystalUniform>()],
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            sky: DescriptorSet::new(
                context,
                pool,
                &layouts.sky,
                &[uniform::<SkyUniform>(), DescriptorElement::Texture(&textures.sky)],
            )?,
            ship: mesh_set(&textures.ship)?,
            asteroids,
            crystals,
            hud: DescriptorSet::new(
                context,
                pool,
                &layouts.hud,
                &[uniform::<HudUniform>(), DescriptorElement::Texture(&textures.boost)],
            )?,
        })
    }
}

/// Every GPU object of the race
///
/// Fields drop top to bottom: pipelines before the set layouts they were
/// built with, descriptor sets before their pool.
struct Scene {
    pipelines: Pipelines,
    sets: ObjectSets,
    _pool: DescriptorPool,
    _layouts: SetLayouts,
    models: Models,
    _textures: Textures,
}

/// Game content handed to the engine
pub struct Race {
    settings: GameSettings,
    renderer_config: RendererConfig,
    course: Course,
    vertex: VertexLayouts,
    scene: Option<Scene>,
    aspect: f32,
    boost_visible: bool,
}

impl Race {
    pub fn new(
        settings: GameSettings,
        renderer_config: RendererConfig,
        vertex: VertexLayouts,
    ) -> Self {
        let course = Course::generate(&settings.course);
        Self {
            settings,
            renderer_config,
            course,
            vertex,
            scene: None,
            aspect: 1.0,
            boost_visible: false,
        }
    }

    fn scene(&self) -> Result<&Scene, AppError> {
        self.scene
            .as_ref()
            .ok_or_else(|| AppError::Custom("scene used before init".to_string()))
    }

    fn track_aspect(&mut self, renderer: &VulkanRenderer<'_>) {
        let extent = renderer.extent();
        self.aspect = extent.width as f32 / extent.height.max(1) as f32;
    }
}

impl Application for Race {
    fn init(
        &mut self,
        context: &VulkanContext,
        renderer: &VulkanRenderer<'_>,
    ) -> Result<(), AppError> {
        log::info!("Building race scene...");
        let game = &self.settings.game;
        let demand = descriptor_demand(self.course.asteroids().len(), self.course.crystals().len());
        check_pool(&demand, &self.renderer_config.descriptor_pool)?;

        let layouts = SetLayouts::new(context)?;
        let pool = DescriptorPool::new(context, &self.renderer_config.descriptor_pool)?;
        let textures = Textures::new(context, game)?;
        let models = Models::new(context, &self.vertex, game)?;
        let sets = ObjectSets::new(context, &pool, &layouts, &textures, &self.course)?;
        let pipelines =
            Pipelines::new(context, renderer, &self.renderer_config, &self.vertex, &layouts)?;

        self.scene = Some(Scene {
            pipelines,
            sets,
            _pool: pool,
            _layouts: layouts,
            models,
            _textures: textures,
        });
        self.track_aspect(renderer);
        log::info!("Race scene ready");
        Ok(())
    }

    fn world(&self) -> &dyn WorldProbe {
        &self.course
    }

    fn update(&mut self, frame: usize, transforms: &FrameTransforms) -> Result<(), AppError> {
        if transforms.collided {
            log::debug!("Bounced at t={:.2}", transforms.time);
        }
        self.boost_visible = transforms.boost_visible;

        let ship_scale = self.settings.game.ship_scale;
        let aspect = self.aspect;
        let course = &self.course;
        let scene = self
            .scene
            .as_mut()
            .ok_or_else(|| AppError::Custom("update before init".to_string()))?;
        let sets = &mut scene.sets;

        let vp = &transforms.view_projection;
        let eye = &transforms.camera_position;
        let sun = Vec3::from(SUN_POSITION);
        let light = LightUniform::new(&sun, SUN_COLOR, eye);

        let sky = SkyUniform::new(&transforms.fixed_view_projection, eye);
        sets.sky.map_value(frame, &sky, SKY_VIEW)?;

        let ship_world = transforms.world * Mat4::new_scaling(ship_scale);
        sets.ship.map_value(frame, &MeshUniform::new(vp, &ship_world), MESH_TRANSFORM)?;
        sets.ship.map_value(frame, &light, MESH_LIGHT)?;

        for (set, asteroid) in sets.asteroids.iter_mut().zip(course.asteroids()) {
            let model = asteroid.transform(transforms.time);
            set.map_value(frame, &MeshUniform::new(vp, &model), MESH_TRANSFORM)?;
            set.map_value(frame, &light, MESH_LIGHT)?;
        }

        let spin = axis_rotation(&Vec3::y(), transforms.time).to_homogeneous();
        let shading = CrystalUniform::new(CRYSTAL_COLOR, &sun, eye, transforms.time);
        for (set, crystal) in sets.crystals.iter_mut().zip(course.crystals()) {
            let model =
                Mat4::new_translation(&crystal.center) * spin * Mat4::new_scaling(crystal.radius);
            set.map_value(frame, &MeshUniform::new(vp, &model), CRYSTAL_TRANSFORM)?;
            set.map_value(frame, &shading, CRYSTAL_SHADING)?;
        }

        let hud = HudUniform::corner_icon(BOOST_ICON_SIZE, aspect, BOOST_ICON_MARGIN);
        sets.hud.map_value(frame, &hud, HUD_RECT)?;
        Ok(())
    }

    fn record(&self, recorder: &mut CommandRecorder, frame: usize) -> Result<(), AppError> {
        let scene = self.scene()?;
        let (pipelines, sets, models) = (&scene.pipelines, &scene.sets, &scene.models);

        let mut queue: RenderQueue<DrawItem<'_>> = RenderQueue::new();
        let mut push = |item| {
            let pass = DrawItem::pass(&item);
            queue.push(pass, item);
        };

        push(DrawItem::new(&pipelines.sky, &models.sky).with_set(&sets.sky));
        push(DrawItem::new(&pipelines.mesh, &models.ship).with_set(&sets.ship));
        for set in &sets.asteroids {
            push(DrawItem::new(&pipelines.mesh, &models.asteroid).with_set(set));
        }
        for set in &sets.crystals {
            push(DrawItem::new(&pipelines.crystal, &models.crystal).with_set(set));
        }
        if self.boost_visible {
            push(DrawItem::new(&pipelines.hud, &models.hud).with_set(&sets.hud));
        }

        record_queue(recorder, &queue, frame)?;
        Ok(())
    }

    fn resize(
        &mut self,
        _context: &VulkanContext,
        renderer: &VulkanRenderer<'_>,
    ) -> Result<(), AppError> {
        self.track_aspect(renderer);
        if let Some(scene) = self.scene.as_mut() {
            scene.pipelines.create(renderer)?;
            log::debug!("Rebuilt pipelines for aspect {:.3}", self.aspect);
        }
        Ok(())
    }

    fn reload(&mut self, context: &VulkanContext) -> Result<(), AppError> {
        let scene = self
            .scene
            .as_mut()
            .ok_or_else(|| AppError::Custom("Reload before init".to_string()))?;
        scene.models.reload(context, &self.vertex, &self.settings.game)
    }

    fn teardown(&mut self) {
        if self.scene.take().is_some() {
            log::info!("Race scene released");
        }
    }
}
