pub mod http_renderer;
