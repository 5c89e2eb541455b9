//! Subset of the GoBGP v2 gRPC API (`gobgpapi` package) consumed by the importer
//!
//! Only the messages needed to list the global RIB and to decode the
//! path attributes carried in `google.protobuf.Any` envelopes are declared here.
use prost_types::{Any, Timestamp};

pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/gobgpapi.";

/// Build the fully-qualified type URL for a message in the `gobgpapi` package
pub fn type_url(name: &str) -> String {
    format!("{}{}", TYPE_URL_PREFIX, name)
}

/// Wrap a message in an `Any` envelope, as GoBGP does for NLRI & path attributes
pub fn to_any<M: prost::Message>(message: &M, name: &str) -> Any {
    Any {
        type_url: type_url(name),
        value: message.encode_to_vec(),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Family {
    #[prost(int32, tag = "1")]
    pub afi: i32,
    #[prost(int32, tag = "2")]
    pub safi: i32,
}

/// `TableType::GLOBAL`
pub const TABLE_TYPE_GLOBAL: i32 = 0;

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListPathRequest {
    #[prost(int32, tag = "1")]
    pub table_type: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, optional, tag = "3")]
    pub family: Option<Family>,
    #[prost(int32, tag = "5")]
    pub sort_type: i32,
    #[prost(bool, tag = "6")]
    pub enable_filtered: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListPathResponse {
    #[prost(message, optional, tag = "1")]
    pub destination: Option<Destination>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Destination {
    #[prost(string, tag = "1")]
    pub prefix: String,
    #[prost(message, repeated, tag = "2")]
    pub paths: Vec<Path>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Path {
    #[prost(message, optional, tag = "1")]
    pub nlri: Option<Any>,
    #[prost(message, repeated, tag = "2")]
    pub pattrs: Vec<Any>,
    // Time the path was received, as a timestamp (not a duration)
    #[prost(message, optional, tag = "3")]
    pub age: Option<Timestamp>,
    #[prost(bool, tag = "4")]
    pub best: bool,
    #[prost(bool, tag = "5")]
    pub is_withdraw: bool,
    // 7 is the RPKI validation result, not needed here
    #[prost(bool, tag = "8")]
    pub no_implicit_withdraw: bool,
    #[prost(message, optional, tag = "9")]
    pub family: Option<Family>,
    #[prost(uint32, tag = "10")]
    pub source_asn: u32,
    #[prost(string, tag = "11")]
    pub source_id: String,
    #[prost(bool, tag = "12")]
    pub filtered: bool,
    #[prost(bool, tag = "13")]
    pub stale: bool,
    #[prost(bool, tag = "14")]
    pub is_from_external: bool,
    #[prost(string, tag = "15")]
    pub neighbor_ip: String,
}

// Attribute messages (attribute.proto)

#[derive(Clone, PartialEq, prost::Message)]
pub struct OriginAttribute {
    #[prost(uint32, tag = "1")]
    pub origin: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AsSegment {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint32, repeated, tag = "2")]
    pub numbers: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AsPathAttribute {
    #[prost(message, repeated, tag = "1")]
    pub segments: Vec<AsSegment>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NextHopAttribute {
    #[prost(string, tag = "1")]
    pub next_hop: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MultiExitDiscAttribute {
    #[prost(uint32, tag = "1")]
    pub med: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LocalPrefAttribute {
    #[prost(uint32, tag = "1")]
    pub local_pref: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CommunitiesAttribute {
    #[prost(uint32, repeated, tag = "1")]
    pub communities: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LargeCommunity {
    #[prost(uint32, tag = "1")]
    pub global_admin: u32,
    #[prost(uint32, tag = "2")]
    pub local_data1: u32,
    #[prost(uint32, tag = "3")]
    pub local_data2: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LargeCommunitiesAttribute {
    #[prost(message, repeated, tag = "1")]
    pub communities: Vec<LargeCommunity>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct IpAddressPrefix {
    #[prost(uint32, tag = "1")]
    pub prefix_len: u32,
    #[prost(string, tag = "2")]
    pub prefix: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MpReachNlriAttribute {
    #[prost(message, optional, tag = "1")]
    pub family: Option<Family>,
    #[prost(string, repeated, tag = "2")]
    pub next_hops: Vec<String>,
    #[prost(message, repeated, tag = "3")]
    pub nlris: Vec<Any>,
}

/// Client for the `gobgpapi.GobgpApi` service (ListPath only)
#[derive(Debug, Clone)]
pub struct GobgpApiClient {
    inner: tonic::client::Grpc<tonic::transport::Channel>,
}

impl GobgpApiClient {
    pub async fn connect(endpoint: String) -> Result<Self, tonic::transport::Error> {
        let channel = tonic::transport::Endpoint::from_shared(endpoint)?
            .connect()
            .await?;
        Ok(Self::new(channel))
    }

    pub fn new(channel: tonic::transport::Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn list_path(
        &mut self,
        request: ListPathRequest,
    ) -> Result<tonic::Response<tonic::codec::Streaming<ListPathResponse>>, tonic::Status> {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::new(
                tonic::Code::Unknown,
                format!("Service was not ready: {}", e),
            )
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/gobgpapi.GobgpApi/ListPath");
        self.inner
            .server_streaming(tonic::Request::new(request), path, codec)
            .await
    }
}
