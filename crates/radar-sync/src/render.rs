// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTML viewer for a station's cached radar loop.
//!
//! The fragment stacks the static layers and cycles through the most recent
//! snapshots once per second. It only reads the cache directory, so it can
//! run concurrently with page requests and with a sync in progress.

use std::fmt::Write as _;
use std::num::NonZeroUsize;
use std::path::Path;

use uuid::Uuid;

use crate::cache::CacheDirectory;
use crate::error::SyncError;
use crate::station::{StaticAsset, StationId};

/// Frames shown when the caller does not choose a loop length.
pub const DEFAULT_LOOP_COUNT: NonZeroUsize = match NonZeroUsize::new(6) {
    Some(n) => n,
    None => unreachable!(),
};

/// Delay between frames, in milliseconds.
const FRAME_INTERVAL_MS: u32 = 1000;

/// Overlay layers drawn above the background, bottom to top.
const OVERLAY_ORDER: [StaticAsset; 3] = [
    StaticAsset::Topography,
    StaticAsset::Locations,
    StaticAsset::Range,
];

/// Renders the animated viewer for one station.
#[derive(Debug, Clone)]
pub struct Renderer {
    station: StationId,
}

impl Renderer {
    #[must_use]
    pub fn new(station: StationId) -> Self {
        Self { station }
    }

    /// The `loop_count` most recent snapshots in `directory/IDR<id>`,
    /// oldest first.
    pub fn select_frames(
        &self,
        directory: &Path,
        loop_count: NonZeroUsize,
    ) -> Result<Vec<String>, SyncError> {
        let names = CacheDirectory::new(directory, &self.station).snapshot_names()?;
        let skip = names.len().saturating_sub(loop_count.get());
        Ok(names.into_iter().skip(skip).collect())
    }

    /// Render the viewer fragment. `public_url` is the URL under which
    /// `directory` is served.
    pub fn render(
        &self,
        directory: &Path,
        public_url: &str,
        loop_count: NonZeroUsize,
    ) -> Result<String, SyncError> {
        let frames = self.select_frames(directory, loop_count)?;
        let uniq = format!("radar{}", Uuid::new_v4().simple());
        let base_url = format!(
            "{}/{}",
            public_url.trim_end_matches('/'),
            self.station.code()
        );
        Ok(self.markup(&uniq, &base_url, &frames))
    }

    fn markup(&self, uniq: &str, base_url: &str, frames: &[String]) -> String {
        let src = |name: &str| escape_attr(&format!("{base_url}/{name}"));
        let mut html = String::new();

        // Writing to a String cannot fail
        let _ = writeln!(html, r#"<div class="radar {uniq}">"#);
        let _ = writeln!(
            html,
            r#"  <img class="radarbg" src="{}" />"#,
            src(&self.station.static_file_name(StaticAsset::Background))
        );
        for layer in OVERLAY_ORDER {
            let _ = writeln!(
                html,
                r#"  <img class="radaroverlay" src="{}" />"#,
                src(&self.station.static_file_name(layer))
            );
        }
        for frame in frames {
            let _ = writeln!(
                html,
                r#"  <img class="radaroverlay {uniq}img hidden" src="{}" />"#,
                src(frame)
            );
        }
        html.push_str("</div>\n");

        let _ = write!(
            html,
            r#"<style>
  .{uniq} {{
    position: relative;
  }}
  .{uniq} .radaroverlay {{
    position: absolute;
    top: 0px;
    left: 0px;
  }}
  .hidden {{
    display: none;
  }}
</style>
<script type="text/javascript">
  function {uniq}_loop(item) {{
    var radarlist = document.getElementsByClassName('{uniq}img');
    if (radarlist.length === 0) {{
      return;
    }}
    for (var i = 0; i < radarlist.length; ++i) {{
      radarlist[i].classList.add('hidden');
    }}
    if (item >= radarlist.length) {{
      item = 0;
    }}
    radarlist[item].classList.remove('hidden');
    setTimeout(function () {{ {uniq}_loop(item + 1); }}, {FRAME_INTERVAL_MS});
  }}
  {uniq}_loop(0);
</script>
"#
        );
        html
    }
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
