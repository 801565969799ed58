use std::sync::Arc;
use std::time::{Duration, Instant};
use doryen_rs::{App, AppOptions, Console, DoryenApi, Engine, TextAlign, UpdateEvent};
use log::debug;

use crate::render::{FrameBuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::world::WorldModel;

// every console cell shows the average color of a 4x4 pixel block
const BLOCK_SIZE: usize = 4;
const CONSOLE_WIDTH: u32 = (SCREEN_WIDTH / BLOCK_SIZE) as u32;
const CONSOLE_HEIGHT: u32 = (SCREEN_HEIGHT / BLOCK_SIZE) as u32;


pub struct ShapeViewer {
    world_model: Arc<WorldModel>,
    frame_buffer: FrameBuffer,

    tile_x: isize,
    tile_y: isize,

    tick_interval: Duration,
    next_tick: Instant,
    next_step: Instant,
}

impl ShapeViewer {
    fn new(world_model: Arc<WorldModel>, tile_x: isize, tile_y: isize, tick_interval: Duration) -> Self {
        Self {
            world_model,
            frame_buffer: FrameBuffer::new(),
            tile_x,
            tile_y,
            tick_interval,
            next_tick: Instant::now(),
            next_step: Instant::now(),
        }
    }

    fn control(&mut self, dx: isize, dy: isize) {
        let now = Instant::now();
        if self.next_step > now || (dx == 0 && dy == 0) {
            return;
        }

        self.tile_x += dx;
        self.tile_y += dy;
        self.next_step = now + Duration::from_millis(50);
        debug!("view moved to tile {}, {}", self.tile_x, self.tile_y);
    }

    fn draw_frame(&self, con: &mut Console) {
        for y in 0..CONSOLE_HEIGHT as usize {
            for x in 0..CONSOLE_WIDTH as usize {
                let color = self.frame_buffer.average_color(x * BLOCK_SIZE, y * BLOCK_SIZE, BLOCK_SIZE, BLOCK_SIZE);
                con.cell(x as i32, y as i32, Some(' ' as u16), None, Some(color));
            }
        }
    }
}


impl Engine for ShapeViewer {
    fn init(&mut self, _api: &mut dyn DoryenApi) {
    }

    fn update(&mut self, api: &mut dyn DoryenApi) -> Option<UpdateEvent> {
        let now = Instant::now();
        if now >= self.next_tick {
            self.world_model.tick();
            self.next_tick = now + self.tick_interval;
        }

        let input = api.input();
        let mov_scale = if input.key("ShiftLeft") { 16 } else { 1 };

        let dx = if input.key("ArrowLeft") {
            -mov_scale
        } else if input.key("ArrowRight") {
            mov_scale
        } else {
            0
        };

        let dy = if input.key("ArrowUp") {
            -mov_scale
        } else if input.key("ArrowDown") {
            mov_scale
        } else {
            0
        };

        self.control(dx, dy);

        None
    }

    fn render(&mut self, api: &mut dyn DoryenApi) {
        self.world_model.render_view(&mut self.frame_buffer, self.tile_x, self.tile_y);

        let con = api.con();
        con.clear(Some((0, 0, 0, 255)), None, Some(' ' as u16));
        self.draw_frame(con);

        con.print(0, 0,
                  &format!("tile: ({} {}) tick: {}", self.tile_x, self.tile_y, self.world_model.frame_counter()),
                  TextAlign::Left,
                  Some((255, 255, 255, 255)),
                  None
        );
    }

    fn resize(&mut self, api: &mut dyn DoryenApi) {
        api.con().resize(CONSOLE_WIDTH, CONSOLE_HEIGHT);
    }
}


pub fn run_app(world_model: Arc<WorldModel>, tile_x: isize, tile_y: isize, tick_interval: Duration) {
    const FONT_SIZE: u32 = 8;

    let mut app = App::new(AppOptions {
        window_title: "Shape Viewer".to_owned(),
        font_path: "terminal_8x8.png".to_owned(),
        console_width: CONSOLE_WIDTH,
        console_height: CONSOLE_HEIGHT,
        screen_width: CONSOLE_WIDTH * FONT_SIZE,
        screen_height: CONSOLE_HEIGHT * FONT_SIZE,

        ..Default::default()
    });

    {
        app.set_engine(Box::new(ShapeViewer::new(world_model, tile_x, tile_y, tick_interval)));
        app.run();
    }
}
