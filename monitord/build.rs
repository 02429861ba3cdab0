use tonic_build::manual::{Builder, Method, Service};

// Message types are prost-derived structs in `src/transport/pb.rs`, so only the
// service and client stubs are generated here and no protoc is required.
// `proto/monitor.proto` is the matching wire contract.
fn main() {
    let method = |name: &str, route: &str, input: &str, output: &str| {
        Method::builder()
            .name(name)
            .route_name(route)
            .input_type(format!("crate::transport::pb::{input}"))
            .output_type(format!("crate::transport::pb::{output}"))
            .codec_path("tonic::codec::ProstCodec")
            .build()
    };

    let monitor = Service::builder()
        .name("Monitor")
        .package("iotmonitor")
        .method(method(
            "register_device",
            "RegisterDevice",
            "RegisterDeviceRequest",
            "RegisterDeviceReply",
        ))
        .method(method(
            "update_device_status",
            "UpdateDeviceStatus",
            "StatusUpdateRequest",
            "StatusUpdateReply",
        ))
        .method(method(
            "submit_telemetry",
            "SubmitTelemetry",
            "TelemetrySubmitRequest",
            "TelemetrySubmitReply",
        ))
        .build();

    Builder::new().compile(&[monitor]);

    println!("cargo:rerun-if-changed=build.rs");
}
