pub mod animate_task;
pub mod chat_task;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
#[cfg(test)]
mod testing;
pub mod write_task;
pub mod ws_handler;

// Re-export the handlers the binary wires into the router.
pub use middleware::require_session;
pub use rest::{
    analyze_image_handler, analyze_video_handler, create_session_handler, delete_session_handler,
    generate_image_handler, module_handler, speech_handler,
};
pub use ws_handler::ws_handler;
