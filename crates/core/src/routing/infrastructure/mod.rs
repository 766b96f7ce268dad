pub mod copy_routing_sink;
pub mod recording_routing_sink;
