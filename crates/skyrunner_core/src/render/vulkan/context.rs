//! Vulkan device context
//!
//! The context is created once at startup and owns the instance, surface,
//! logical device, queues and the shared command pool. Every GPU resource
//! borrows it at construction and keeps its own clone of the device handle.

use std::collections::HashSet;
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use thiserror::Error;

use super::commands::CommandPool;
use super::memory::{self, AllocationLedger};
use super::window::Window;
use crate::core::config::RendererConfig;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Memory allocation failed
    #[error("Out of memory: {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: u64,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Uniform data larger than the slot it is written to
    #[error("Uniform write of {requested} bytes exceeds binding {binding} capacity of {capacity} bytes")]
    UniformOverflow {
        /// Binding slot written to
        binding: u32,
        /// Bytes the slot holds
        capacity: u64,
        /// Bytes the caller tried to write
        requested: u64,
    },
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::OutOfMemory { requested: 0 }
            }
            other => Self::Api(other),
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance with optional validation messenger
pub struct VulkanInstance {
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    instance: Instance,
    entry: Entry,
}

impl VulkanInstance {
    /// Create an instance with the extensions `window` needs
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let app_name = cstring(app_name)?;
        let engine_name = cstring("Skyrunner")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required = window.required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}"))
        })?;
        let required = required.iter().map(|ext| cstring(ext)).collect::<VulkanResult<Vec<_>>>()?;
        let mut extensions: Vec<*const c_char> = required.iter().map(|ext| ext.as_ptr()).collect();

        let validation_layer = cstring("VK_LAYER_KHRONOS_validation")?;
        let validation = enable_validation && layer_available(&entry, &validation_layer);
        if enable_validation && !validation {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }

        let layers: Vec<*const c_char> = if validation {
            extensions.push(DebugUtils::name().as_ptr());
            vec![validation_layer.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_callback));
            let messenger =
                unsafe { debug_utils.create_debug_utils_messenger(&messenger_info, None)? };
            log::info!("Vulkan validation layers enabled");
            Some((debug_utils, messenger))
        } else {
            None
        };

        Ok(Self { debug, instance, entry })
    }

    /// Instance handle
    pub fn raw(&self) -> &Instance {
        &self.instance
    }

    /// Loader entry
    pub fn entry(&self) -> &Entry {
        &self.entry
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn cstring(value: &str) -> VulkanResult<CString> {
    CString::new(value)
        .map_err(|_| VulkanError::InitializationFailed(format!("interior NUL in {value:?}")))
}

fn layer_available(entry: &Entry, name: &CStr) -> bool {
    entry
        .enumerate_instance_layer_properties()
        .map(|layers| {
            layers
                .iter()
                .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == name)
        })
        .unwrap_or(false)
}

/// Forwards validation messages into `log`
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Selected physical device and what the renderer needs to know about it
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Whether anisotropic filtering can be enabled
    pub sampler_anisotropy: bool,
}

impl PhysicalDeviceInfo {
    /// Pick the first device with graphics, present and swapchain support,
    /// preferring discrete GPUs
    pub fn select(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices()? };

        let mut candidates: Vec<Self> = devices
            .into_iter()
            .filter_map(|device| match Self::evaluate(instance, device, surface, surface_loader) {
                Ok(info) => Some(info),
                Err(e) => {
                    log::debug!("Skipping physical device: {}", e);
                    None
                }
            })
            .collect();
        candidates.sort_by_key(|info| {
            info.properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
        });

        let selected = candidates
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("No suitable GPU found".to_string()))?;

        log::info!("Selected GPU: {}", selected.name());
        Ok(selected)
    }

    fn evaluate(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;
            if graphics_family.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics_family = Some(index);
            }
            let present = unsafe {
                surface_loader.get_physical_device_surface_support(device, index, surface)?
            };
            if present_family.is_none() && present {
                present_family = Some(index);
            }
        }

        let graphics_family = graphics_family.ok_or_else(|| {
            VulkanError::InitializationFailed("No graphics queue family found".to_string())
        })?;
        let present_family = present_family.ok_or_else(|| {
            VulkanError::InitializationFailed("No present queue family found".to_string())
        })?;

        let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
        let has_swapchain = extensions.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(
                "VK_KHR_swapchain not supported".to_string(),
            ));
        }

        Ok(Self {
            device,
            properties,
            memory_properties,
            graphics_family,
            present_family,
            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
        })
    }

    /// Device name reported by the driver
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Highest sample count supported by both color and depth framebuffers, at most `cap`
pub fn max_usable_samples(limits: &vk::PhysicalDeviceLimits, cap: u32) -> vk::SampleCountFlags {
    let supported = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
    [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .find(|&count| count.as_raw() <= cap && supported.contains(count))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Logical device and its queues
pub struct LogicalDevice {
    device: Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the device with one graphics and one present queue
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families: HashSet<u32> =
            [physical.graphics_family, physical.present_family].into_iter().collect();
        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = [SwapchainLoader::name().as_ptr()];
        let features =
            vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(physical.sampler_anisotropy);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical.device, &create_info, None)? };
        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Process-wide Vulkan handles
///
/// Field order is destruction order: the command pool goes before the
/// device, the device before the instance.
pub struct VulkanContext {
    command_pool: CommandPool,
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    msaa_samples: vk::SampleCountFlags,
    ledger: Arc<AllocationLedger>,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Bring up Vulkan for `window`
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance =
            VulkanInstance::new(window, &config.application_name, config.validation_enabled())?;

        let surface_loader = Surface::new(instance.entry(), instance.raw());
        let surface = window
            .create_surface(instance.raw().handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;

        let selected = PhysicalDeviceInfo::select(instance.raw(), surface, &surface_loader);
        let physical_device = match selected {
            Ok(info) => info,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };
        let device = LogicalDevice::new(instance.raw(), &physical_device)?;
        let command_pool =
            CommandPool::new(device.device.clone(), physical_device.graphics_family)?;

        let msaa_samples = if config.msaa {
            max_usable_samples(&physical_device.properties.limits, config.max_msaa_samples)
        } else {
            vk::SampleCountFlags::TYPE_1
        };
        log::info!("Using {:?} samples per pixel", msaa_samples);

        Ok(Self {
            command_pool,
            device,
            physical_device,
            surface,
            surface_loader,
            msaa_samples,
            ledger: Arc::new(AllocationLedger::new()),
            instance,
        })
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        self.instance.raw()
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Queue family indices used for swapchain sharing
    pub fn queue_families(&self) -> [u32; 2] {
        [self.physical_device.graphics_family, self.physical_device.present_family]
    }

    /// Shared command pool for per-frame and one-shot command buffers
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Sample count for color and depth attachments
    pub fn msaa_samples(&self) -> vk::SampleCountFlags {
        self.msaa_samples
    }

    /// Allocation counters shared with every resource
    pub fn ledger(&self) -> &Arc<AllocationLedger> {
        &self.ledger
    }

    /// Memory type index for `type_filter` with `properties`
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<u32> {
        memory::find_memory_type(&self.physical_device.memory_properties, type_filter, properties)
    }

    /// Whether `format` supports `features` with optimal tiling
    pub fn supports_optimal(&self, format: vk::Format, features: vk::FormatFeatureFlags) -> bool {
        let props = unsafe {
            self.instance()
                .get_physical_device_format_properties(self.physical_device.device, format)
        };
        props.optimal_tiling_features.contains(features)
    }

    /// First of `candidates` usable as a depth attachment
    pub fn find_depth_format(&self) -> VulkanResult<vk::Format> {
        [vk::Format::D32_SFLOAT, vk::Format::D32_SFLOAT_S8_UINT, vk::Format::D24_UNORM_S8_UINT]
            .into_iter()
            .find(|&f| self.supports_optimal(f, vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT))
            .ok_or_else(|| {
                VulkanError::InitializationFailed("No supported depth format".to_string())
            })
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        let _ = self.wait_idle();
        self.ledger.report_leaks();
        unsafe { self.surface_loader.destroy_surface(self.surface, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(
        color: vk::SampleCountFlags,
        depth: vk::SampleCountFlags,
    ) -> vk::PhysicalDeviceLimits {
        vk::PhysicalDeviceLimits {
            framebuffer_color_sample_counts: color,
            framebuffer_depth_sample_counts: depth,
            ..Default::default()
        }
    }

    #[test]
    fn test_max_samples_is_shared_by_color_and_depth() {
        let all = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_8;
        let depth = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4;

        assert_eq!(max_usable_samples(&limits(all, depth), 64), vk::SampleCountFlags::TYPE_4);
        assert_eq!(max_usable_samples(&limits(all, all), 64), vk::SampleCountFlags::TYPE_8);
    }

    #[test]
    fn test_max_samples_respects_cap() {
        let all = vk::SampleCountFlags::from_raw(0x7f);
        assert_eq!(max_usable_samples(&limits(all, all), 4), vk::SampleCountFlags::TYPE_4);
        assert_eq!(max_usable_samples(&limits(all, all), 1), vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn test_out_of_memory_results_map_to_oom() {
        assert!(matches!(
            VulkanError::from(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            VulkanError::OutOfMemory { .. }
        ));
        assert!(matches!(
            VulkanError::from(vk::Result::ERROR_DEVICE_LOST),
            VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)
        ));
    }
}
