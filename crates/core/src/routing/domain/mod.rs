pub mod routing_sink;
