use std;
use std::cell::RefCell;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot::Sender;
use log::{error, info};

pub mod config;
pub mod error;
pub mod flx;
pub mod render;
pub mod world;
pub mod http;
pub mod ui;

use config::Config;
use world::WorldModel;


struct ServerControl {
    stop_signal: Sender<()>,
    handle: JoinHandle<()>,
}


thread_local! {
    static SERVER_CONTROL: RefCell<Option<ServerControl>> = RefCell::new(None);
}


#[no_mangle]
pub extern "C" fn start_shape_server() -> bool {
    info!("start shape server");
    SERVER_CONTROL.with(|control| {
        if control.borrow().is_some() {
            return false;
        }

        match run_service(&Config::default()) {
            Some(server) => {
                control.replace(Some(server));
                true
            }
            None => false,
        }
    })
}


#[no_mangle]
pub extern "C" fn stop_shape_server() -> bool {
    info!("stop shape server");
    SERVER_CONTROL.with(|control| {
        let control = control.replace(None);
        match control {
            None => false,
            Some(control) => {
                // the server may be gone already if it failed to bind
                control.stop_signal.send(()).ok();
                if control.handle.join().is_err() {
                    error!("http server thread panicked");
                }
                true
            }
        }
    })
}


/// Loads the world described by `config` and serves it over http on a separate thread.
fn run_service(config: &Config) -> Option<ServerControl> {
    let world_model = match WorldModel::from_config(config) {
        Ok(model) => Arc::new(model),
        Err(err) => {
            error!("unable to load data from {}: {err}", config.data_dir.display());
            return None;
        }
    };

    let (handle, stop_signal) = spawn_http_server(world_model, config);
    Some(ServerControl { stop_signal, handle })
}


pub fn spawn_http_server(world_model: Arc<WorldModel>, config: &Config) -> (JoinHandle<()>, Sender<()>) {
    let (http_stop_tx, http_stop_rx) = tokio::sync::oneshot::channel::<()>();
    let addr = config.http_address;

    let handle = std::thread::spawn(move || {
        http::http_server_service(world_model, addr, http_stop_rx);
    });

    (handle, http_stop_tx)
}
