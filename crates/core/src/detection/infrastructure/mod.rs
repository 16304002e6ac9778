pub mod haar_cascade;
pub mod integral_image;
pub mod locator_factory;
pub mod rect_grouping;
pub mod skip_frame_detector;
