//! Wire messages of the `iotmonitor.Monitor` gRPC service (see
//! `proto/monitor.proto`). Service and client stubs are generated by `build.rs`.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DeviceType {
    Drone = 0,
    Sensor = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterDeviceRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub owner: ::prost::alloc::string::String,
    #[prost(enumeration = "DeviceType", tag = "3")]
    pub device_type: i32,
    #[prost(string, tag = "4")]
    pub serial_number: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterDeviceReply {
    #[prost(bool, tag = "1")]
    pub registered: bool,
    #[prost(uint64, tag = "2")]
    pub device_id: u64,
    #[prost(string, tag = "3")]
    pub err: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Location {
    #[prost(float, tag = "1")]
    pub latitude: f32,
    #[prost(float, tag = "2")]
    pub longitude: f32,
    #[prost(float, tag = "3")]
    pub altitude: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusUpdateRequest {
    #[prost(uint64, tag = "1")]
    pub device_id: u64,
    #[prost(message, optional, tag = "2")]
    pub location: ::core::option::Option<Location>,
    #[prost(uint32, tag = "3")]
    pub battery_remaining: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusUpdateReply {
    #[prost(bool, tag = "1")]
    pub acknowledged: bool,
    #[prost(string, tag = "2")]
    pub err: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TelemetrySubmitRequest {
    #[prost(uint64, tag = "1")]
    pub device_id: u64,
    #[prost(map = "string, float", tag = "2")]
    pub readings: ::std::collections::HashMap<::prost::alloc::string::String, f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TelemetrySubmitReply {
    #[prost(bool, tag = "1")]
    pub acknowledged: bool,
    #[prost(string, tag = "2")]
    pub err: ::prost::alloc::string::String,
}

include!(concat!(env!("OUT_DIR"), "/iotmonitor.Monitor.rs"));
