use std::borrow::Cow;
use std::io::Stdout;
use std::time::Duration;

use pbr::ProgressBar;

/// Console progress over a known number of cycles.
pub struct CycleReporter {
  name: Cow<'static, str>,
  progress: ProgressBar<Stdout>,
}
impl CycleReporter {
  pub fn new(cycles: u64, name: Cow<'static, str>) -> CycleReporter {
    let mut p = ProgressBar::new(cycles);
    p.show_speed = false;
    p.show_percent = true;
    p.show_counter = true;
    p.show_time_left = false;

    let fps = Duration::new(1, 0) / 60;
    p.set_max_refresh_rate(Some(fps));

    let msg = format!("{}: ", name);
    p.message(&msg[..]);
    CycleReporter {
      name: name,
      progress: p,
    }
  }

  pub fn tick(&mut self) {
    self.progress.inc();
  }

  pub fn finish(mut self) {
    let msg = format!("{} done!", self.name);
    self.progress.finish_println(&msg);
  }
}
