mod renderer;
mod surface;

pub use renderer::FrameRenderer;
pub use surface::{
    draw_line, encode_png, encode_png_base64, fill_circle, fill_rect, outline_rect, Colour,
    LayeredFrame, RenderError, TRANSPARENT,
};
