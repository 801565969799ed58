use std::convert::Infallible;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio;
use tokio::sync::oneshot::Receiver;

use hyper::{Body, Method, Request, Response, Server, StatusCode};
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};

use serde::{Deserialize, Serialize};

use image::{ImageOutputFormat, RgbaImage};
use log::{error, info};

use crate::flx::ShapeAttributes;
use crate::flx::chunkdata::CHUNK_TILES;
use crate::render::FrameBuffer;
use crate::world::WorldModel;


#[derive(Serialize, Deserialize, Debug)]
pub enum ApiRequest {
    RenderView { tile_x: isize, tile_y: isize, },
    RenderShape { shape: u16, frame: u16, },

    ShapeInfo { shape: usize, },
    Chunk { chunk: usize, },
    Region { region_x: usize, region_y: usize, },

    Tick { count: Option<usize>, },
}


#[derive(Serialize)]
pub enum ApiResponse {
    Success { },
    Error { err: String, },
    ShapeInfoReply { attributes: ShapeAttributes, },
    GridReply { cells: Vec<[u16; CHUNK_TILES]>, },
    #[serde(skip_serializing)]
    RenderReply { image: RgbaImage },
}


#[derive(Clone)]
struct ApiHandler {
    world_model: Arc<WorldModel>,
}


impl ApiHandler {
    pub fn new(context: Arc<WorldModel>) -> Self {
        Self {
            world_model: context
        }
    }


    async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        // reading the request body as bytes
        let body_bytes = match hyper::body::to_bytes(req.into_body()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("Api::error body reading - {err}");
                let response = ApiResponse::Error { err: format!("Failed to read request body: {err}") };
                return Self::serialize_response(response);
            }
        };

        // trying to deserialize it from json to an enum instance `ApiRequest`
        let api_request = serde_json::from_slice::<ApiRequest>(&body_bytes);

        let api_response = match api_request {
            // the request was successfully parsed, we execute it and get a response
            Ok(api_request) => {
                match api_request {
                    ApiRequest::RenderView { tile_x, tile_y }
                        => self.handle_render_view(tile_x, tile_y).await,
                    ApiRequest::RenderShape { shape, frame }
                        => self.handle_render_shape(shape, frame).await,

                    ApiRequest::ShapeInfo { shape }
                        => self.handle_shape_info(shape),
                    ApiRequest::Chunk { chunk }
                        => self.handle_chunk(chunk),
                    ApiRequest::Region { region_x, region_y }
                        => self.handle_region(region_x, region_y),

                    ApiRequest::Tick { count }
                        => self.handle_tick(count).await,
                }
            },

            // parsing failed, make a response that will include a description of the error
            Err(err) => {
                error!("Api::error request parsing - {err}");

                ApiResponse::Error { err: format!("Failed to parse request body: {err}") }
            }
        };

        Self::serialize_response(api_response)
    }


    fn serialize_response(response: ApiResponse) -> Result<Response<Body>, Infallible> {
        match response {
            // special case, RenderReply return png image, not json
            ApiResponse::RenderReply { image } => {
                let mut write_buffer = Cursor::new(Vec::with_capacity(image.width() as usize * image.height() as usize));

                match image.write_to(&mut write_buffer, ImageOutputFormat::Png) {
                    Ok(()) => {
                        let image_buffer = write_buffer.into_inner();
                        let length = image_buffer.len();

                        let mut reply = Response::new(Body::from(image_buffer));
                        reply.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
                        reply.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(length));
                        Ok(reply)
                    }
                    Err(err) => {
                        error!("Api::error png encoding - {err}");
                        Self::serialize_response(ApiResponse::Error { err: format!("Failed to encode image: {err}") })
                    }
                }
            }

            // common case, serialize reply to json
            response => {
                let response_body = serde_json::to_string(&response)
                    .unwrap_or_else(|err| format!(r#"{{"Error":{{"err":"{err}"}}}}"#));

                let mut reply = Response::new(Body::from(response_body));
                reply.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Ok(reply)
            }
        }
    }

    // Handlers
    async fn handle_render_view(&self, tile_x: isize, tile_y: isize) -> ApiResponse {
        info!("Api::render_view from tile {tile_x}, {tile_y}");
        let model = self.world_model.clone();

        let task = tokio::task::spawn_blocking(move || {
            let mut frame_buffer = FrameBuffer::new();
            model.render_view(&mut frame_buffer, tile_x, tile_y);
            frame_buffer.to_image()
        });

        match task.await {
            Ok(image) => ApiResponse::RenderReply { image },
            Err(err) => ApiResponse::Error { err: format!("Rendering failed: {err}") },
        }
    }


    async fn handle_render_shape(&self, shape: u16, frame: u16) -> ApiResponse {
        info!("Api::render_shape shape {shape}, frame {frame}");
        let model = self.world_model.clone();

        let task = tokio::task::spawn_blocking(move || {
            let mut frame_buffer = FrameBuffer::new();
            model.render_shape(&mut frame_buffer, shape, frame).then(|| frame_buffer.to_image())
        });

        match task.await {
            Ok(Some(image)) => ApiResponse::RenderReply { image },
            Ok(None) => ApiResponse::Error { err: format!("Shape {shape} frame {frame} has no image") },
            Err(err) => ApiResponse::Error { err: format!("Rendering failed: {err}") },
        }
    }


    fn handle_shape_info(&self, shape: usize) -> ApiResponse {
        info!("Api::shape_info shape {shape}");
        match self.world_model.shape_attributes(shape) {
            Ok(attributes) => ApiResponse::ShapeInfoReply { attributes },
            Err(err) => ApiResponse::Error { err: err.to_string() },
        }
    }


    fn handle_chunk(&self, chunk: usize) -> ApiResponse {
        info!("Api::chunk {chunk}");
        match self.world_model.chunk(chunk) {
            Ok(block) => ApiResponse::GridReply { cells: block.to_vec() },
            Err(err) => ApiResponse::Error { err: err.to_string() },
        }
    }


    fn handle_region(&self, region_x: usize, region_y: usize) -> ApiResponse {
        info!("Api::region {region_x}, {region_y}");
        match self.world_model.world_region(region_x, region_y) {
            Ok(block) => ApiResponse::GridReply { cells: block.to_vec() },
            Err(err) => ApiResponse::Error { err: err.to_string() },
        }
    }


    async fn handle_tick(&self, count: Option<usize>) -> ApiResponse {
        let count = match tick_count(count) {
            Ok(count) => count,
            Err(err) => return ApiResponse::Error { err },
        };

        info!("Api::tick {count} times");
        let model = self.world_model.clone();

        // every tick waits for the palette behind renders in progress
        let task = tokio::task::spawn_blocking(move || {
            for _ in 0..count {
                model.tick();
            }
        });

        match task.await {
            Ok(()) => ApiResponse::Success {},
            Err(err) => ApiResponse::Error { err: format!("Tick failed: {err}") },
        }
    }
}


const MAX_TICKS: usize = 1024;

/// number of ticks a request asks for, one by default
fn tick_count(count: Option<usize>) -> Result<usize, String> {
    match count.unwrap_or(1) {
        count if count > MAX_TICKS => Err(format!("Tick count {count} exceeds the limit of {MAX_TICKS}")),
        count => Ok(count),
    }
}


async fn handle_request(api: Arc<ApiHandler>, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if req.method() == Method::POST && req.uri().path() == "/api/" {
        let api = api.as_ref();
        return api.handle_request(req).await;
    }

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_FOUND;

    Ok(response)
}


async fn http_svc(model: Arc<WorldModel>, addr: SocketAddr, http_stop: Receiver<()>) {
    let api_handler = Arc::new(ApiHandler::new(model));

    let make_service = make_service_fn(move |_conn| {
        let api = api_handler.clone(); // clone the Arc reference
        let service = service_fn(move |req| {
            handle_request(api.clone(), req) // use the Arc reference
        });

        async move { Ok::<_, Infallible>(service) }
    });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_service),
        Err(err) => {
            error!("unable to bind {addr}: {err}");
            return;
        }
    };

    let server = server.with_graceful_shutdown(async {
        http_stop.await.ok();
    });

    info!("Listening on http://{}", addr);
    if let Err(e) = server.await {
        error!("server error: {}", e);
    } else {
        info!("server stopped successfully")
    }
}

pub fn http_server_service(model: Arc<WorldModel>, addr: SocketAddr, http_stop: Receiver<()>) {
    // start http service in single thread runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .thread_name("http_server_thread")
        .build();

    let rt = match rt {
        Ok(rt) => rt,
        Err(err) => {
            error!("unable to start http runtime: {err}");
            return;
        }
    };

    // block thread while service is running
    rt.block_on(http_svc(model, addr, http_stop));
}
