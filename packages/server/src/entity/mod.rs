pub mod screenshot_attachment;
