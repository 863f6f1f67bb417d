// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pretty printing of grouped information.

use std::borrow::Cow;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

/// Collects lines under a bold title, then logs them as a tree:
///
/// ```text
/// Pipeline settings
/// ├ Sort strategy: from_middle
/// └ Edge channels: removed
/// ```
///
/// Lines pushed together as a block share a single branch.
pub(super) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl InfoPrinter {
    pub(super) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(super) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(super) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    pub(super) fn display(self) {
        log::info!("{}", console::style(self.title).bold());
        let num_blocks = self.blocks.len();
        for (i_block, block) in self.blocks.into_iter().enumerate() {
            let last_block = i_block + 1 == num_blocks;
            for (i_line, line) in block.into_iter().enumerate() {
                let symbol = match (i_line, last_block) {
                    (0, false) => VERTICAL_AND_RIGHT,
                    (0, true) => UP_AND_RIGHT,
                    (_, false) => VERTICAL,
                    (_, true) => ' ',
                };
                log::info!("{symbol} {line}");
            }
        }
        log::info!("");
    }
}
