//! Build script for the provider protocol service.
//!
//! The protocol messages are committed in `src/generated.rs` (mirroring
//! `proto/provider.proto`). The gRPC service glue is generated here with
//! tonic's manual service builder, which needs no `protoc` on the build host.
//!
//! The output lands in `$OUT_DIR/hemmer.provider.v1.Provider.rs` and is
//! included by `src/generated.rs`.

use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic_prost::ProstCodec";

/// (rust method name, gRPC route name, request type, response type)
const METHODS: &[(&str, &str, &str, &str)] = &[
    ("get_metadata", "GetMetadata", "GetMetadataRequest", "GetMetadataResponse"),
    ("get_schema", "GetSchema", "GetSchemaRequest", "GetSchemaResponse"),
    (
        "validate_provider_config",
        "ValidateProviderConfig",
        "ValidateProviderConfigRequest",
        "ValidateProviderConfigResponse",
    ),
    ("configure", "Configure", "ConfigureRequest", "ConfigureResponse"),
    ("stop", "Stop", "StopRequest", "StopResponse"),
    (
        "validate_resource_config",
        "ValidateResourceConfig",
        "ValidateResourceConfigRequest",
        "ValidateResourceConfigResponse",
    ),
    ("plan", "Plan", "PlanRequest", "PlanResponse"),
    ("create", "Create", "CreateRequest", "CreateResponse"),
    ("read", "Read", "ReadRequest", "ReadResponse"),
    ("update", "Update", "UpdateRequest", "UpdateResponse"),
    ("delete", "Delete", "DeleteRequest", "DeleteResponse"),
    (
        "import_resource_state",
        "ImportResourceState",
        "ImportResourceStateRequest",
        "ImportResourceStateResponse",
    ),
];

fn main() {
    let mut service = Service::builder()
        .name("Provider")
        .package("hemmer.provider.v1")
        .comment("The provider protocol spoken between Hemmer and a provider plugin.");

    for (name, route, input, output) in METHODS {
        service = service.method(
            Method::builder()
                .name(*name)
                .route_name(*route)
                .input_type(format!("crate::generated::{}", input))
                .output_type(format!("crate::generated::{}", output))
                .codec_path(CODEC)
                .build(),
        );
    }

    Builder::new()
        .build_client(false)
        .compile(&[service.build()]);

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=proto/provider.proto");
}
