use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::DeviceContext;
use crate::renderer::contexts::device_ctx::target::Swapchain;
use crate::renderer::contexts::pipeline_ctx::pipeline::Pipeline;
use crate::renderer::contexts::resource_ctx::{DepthResource, DrawEntry};
use crate::renderer::vk::util::{self, LayoutState};

/// Result of one bounded fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
}

/// Non-indexed draw for one registered object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub vertex_count: u32,
    pub first_vertex: u32,
}

pub fn draw_commands(entries: &[DrawEntry]) -> impl Iterator<Item = DrawCommand> + '_ {
    entries.iter().map(|entry| DrawCommand {
        vertex_count: entry.vertex_count(),
        first_vertex: entry.first_vertex,
    })
}

/// Everything one frame's command buffer draws with
pub struct FrameTargets<'a> {
    pub color_image: vk::Image,
    pub color_view: vk::ImageView,
    pub depth: &'a DepthResource,
    pub extent: vk::Extent2D,
    pub pipeline: &'a Pipeline,
    pub vertex_buffer: vk::Buffer,
    pub entries: &'a [DrawEntry],
    pub clear_color: [f32; 4],
}

/// Command buffer and sync objects for the single frame in flight
pub struct Frame {
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,

    // Signals when the acquired swapchain image can be rendered to.
    image_acquired: vk::Semaphore,

    // Signals when all rendering commands have finished execution.
    render_fence: vk::Fence,

    queue: vk::Queue,
    device: Arc<ash::Device>,
}

impl Frame {
    pub fn new(ctx: &DeviceContext) -> Result<Self> {
        let device = ctx.device.logical.clone();
        let queue = &ctx.device.graphics_queue;

        let command_pool = {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                .queue_family_index(queue.family.index);
            unsafe { device.create_command_pool(&pool_info, None)? }
        };

        let mut frame = Self {
            command_pool,
            command_buffer: vk::CommandBuffer::null(),
            image_acquired: vk::Semaphore::null(),
            render_fence: vk::Fence::null(),
            queue: queue.handle,
            device: device.clone(),
        };

        frame.command_buffer = {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            unsafe { device.allocate_command_buffers(&alloc_info)? }
                .first()
                .copied()
                .ok_or_else(|| eyre!("Command pool returned no command buffers"))?
        };
        frame.image_acquired = unsafe {
            device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        // Starts unsignaled; the first wait happens after the first submit
        frame.render_fence = unsafe {
            device.create_fence(&vk::FenceCreateInfo::default(), None)?
        };

        Ok(frame)
    }

    pub fn acquire(&self, swapchain: &Swapchain, timeout_ns: u64) -> Result<u32> {
        let acquired = unsafe {
            swapchain.loader.acquire_next_image(
                swapchain.handle,
                timeout_ns,
                self.image_acquired,
                vk::Fence::null(),
            )
        };

        match acquired {
            Ok((index, false)) if (index as usize) < swapchain.images.len() => Ok(index),
            Ok((index, false)) => Err(eyre!(
                "Acquired swapchain image index {} out of range ({} images)",
                index,
                swapchain.images.len(),
            )),
            Ok((_, true)) => Err(eyre!("Swapchain is suboptimal and cannot be recreated")),
            Err(err) => Err(eyre!("Failed to acquire swapchain image: {}", err)),
        }
    }

    pub fn record(&self, targets: &FrameTargets) -> Result<()> {
        let device = &self.device;
        let cmd = self.command_buffer;

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin_info)?;
        }

        // Both attachments are cleared every frame, so their old contents can be discarded
        util::transition_image_layouts(
            cmd,
            &[
                util::image_barrier(
                    targets.color_image,
                    vk::ImageAspectFlags::COLOR,
                    LayoutState::UNDEFINED_COLOR_OUTPUT,
                    LayoutState::COLOR_ATTACHMENT,
                ),
                util::image_barrier(
                    targets.depth.image,
                    vk::ImageAspectFlags::DEPTH,
                    LayoutState::UNDEFINED,
                    LayoutState::DEPTH_ATTACHMENT,
                ),
            ],
            device,
        );

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(targets.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: targets.clear_color },
            })];
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(targets.depth.view)
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(util::full_extent_scissor(targets.extent))
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        unsafe {
            device.cmd_begin_rendering(cmd, &rendering_info);

            targets.pipeline.bind(cmd);
            device.cmd_bind_vertex_buffers(cmd, 0, &[targets.vertex_buffer], &[0]);
            device.cmd_set_viewport(cmd, 0, &[util::full_extent_viewport(targets.extent)]);
            device.cmd_set_scissor(cmd, 0, &[util::full_extent_scissor(targets.extent)]);

            for draw in draw_commands(targets.entries) {
                device.cmd_draw(cmd, draw.vertex_count, 1, draw.first_vertex, 0);
            }

            device.cmd_end_rendering(cmd);
        }

        util::transition_image_layouts(
            cmd,
            &[util::image_barrier(
                targets.color_image,
                vk::ImageAspectFlags::COLOR,
                LayoutState::COLOR_ATTACHMENT,
                LayoutState::PRESENT,
            )],
            device,
        );

        unsafe { device.end_command_buffer(cmd)? };
        Ok(())
    }

    pub fn submit(&self) -> Result<()> {
        let wait_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.image_acquired)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let cmd_infos = [vk::CommandBufferSubmitInfo::default()
            .command_buffer(self.command_buffer)];
        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&cmd_infos);

        unsafe {
            self.device.queue_submit2(self.queue, &[submit_info], self.render_fence)?;
        }
        Ok(())
    }

    /// One bounded wait on the render fence. Resets the fence once it has signaled.
    pub fn wait(&self, timeout_ns: u64) -> Result<WaitOutcome> {
        let waited = unsafe {
            self.device.wait_for_fences(&[self.render_fence], true, timeout_ns)
        };

        match waited {
            Ok(()) => {
                unsafe { self.device.reset_fences(&[self.render_fence])? };
                Ok(WaitOutcome::Signaled)
            }
            Err(vk::Result::TIMEOUT) => Ok(WaitOutcome::TimedOut),
            Err(err) => Err(eyre!("Failed waiting for render fence: {}", err)),
        }
    }

    /// Presentation problems are reported but never fatal
    pub fn present(&self, swapchain: &Swapchain, image_index: u32) {
        let swapchains = [swapchain.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { swapchain.loader.queue_present(self.queue, &present_info) } {
            Ok(false) => {}
            Ok(true) => log::warn!("Presented image {} to a suboptimal swapchain", image_index),
            Err(err) => log::warn!("Failed to present image {}: {}", image_index, err),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.image_acquired, None);
            self.device.destroy_fence(self.render_fence, None);
            // Frees the command buffer with it
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use crate::renderer::resources::object::GeometryObject;

    fn entry(count: usize, first_vertex: u32) -> DrawEntry {
        let points = vec![Vec3::ZERO; count];
        DrawEntry {
            object: GeometryObject::curve(&points, Vec4::ONE),
            first_vertex,
        }
    }

    #[test]
    fn one_draw_per_entry_in_registration_order() {
        let entries = [entry(3, 0), entry(4, 3), entry(5, 7)];
        assert_eq!(
            draw_commands(&entries).collect::<Vec<_>>(),
            vec![
                DrawCommand { vertex_count: 3, first_vertex: 0 },
                DrawCommand { vertex_count: 4, first_vertex: 3 },
                DrawCommand { vertex_count: 5, first_vertex: 7 },
            ],
        );
    }

    #[test]
    fn no_entries_means_no_draws() {
        assert_eq!(draw_commands(&[]).count(), 0);
    }
}
