//! Write `legend.html` showing color scales and the legends built on
//! them.

use std::{env,
          io::{BufWriter, Write},
          fs::File};
use anyhow::Result;
use rgb::RGB8;
use choropleth::{Bins, Interpolation, Legend, NumberFormat, RGBColor, Scheme};

fn table_of_colors(fh: &mut impl Write, colors: &[RGB8], labels: &[String],
                   width: u32, comment: &str) -> Result<()> {
    writeln!(fh, "<table style=\"border: 0px;  border-spacing: 0px\"><tr>")?;
    for c in colors {
        writeln!(fh, "  <td style=\"width: {width}px; height: 30px; \
                      background-color: {}\"></td>", c.to_hex())?;
    }
    writeln!(fh, "<td rowspan=\"3\" style=\"padding-left: 7px\">\
                  {comment}</td></tr><tr>")?;
    for c in colors {
        writeln!(fh, "  <td style=\"width: {width}px; height: 12px; \
                      background-color: {}\"></td>", c.to_gray().to_hex())?;
    }
    writeln!(fh, "</tr><tr>")?;
    for l in labels {
        writeln!(fh, "  <td style=\"font-size: small; text-align: center\">{l}</td>")?;
    }
    writeln!(fh, "</tr></table><br/>")?;
    Ok(())
}

fn scheme(fh: &mut impl Write, s: &Scheme, n: usize, width: u32, comment: &str)
          -> Result<()> {
    for space in [Interpolation::Hsl, Interpolation::Hcl] {
        let colors = s.colors(n, space);
        table_of_colors(fh, &colors, &[], width, &format!("{comment} ({space:?})"))?;
    }
    Ok(())
}

fn legend(fh: &mut impl Write, s: &Scheme, bins: Bins, format: &str,
          truncated: bool) -> Result<()> {
    let f = NumberFormat::lookup(format)?;
    let colors = s.colors(bins.steps(), Interpolation::Hsl);
    let legend = Legend::new(&colors, bins, RGB8::new(0xdd, 0xdd, 0xdd), truncated,
                             |x| f.format(x));
    let (colors, labels): (Vec<_>, Vec<_>) = legend.entries().iter()
        .map(|e| (e.color, e.label.clone()))
        .unzip();
    table_of_colors(fh, &colors, &labels, 70, format)
}

fn main() -> Result<()> {
    let mut fh = BufWriter::new(File::create("legend.html")?);
    writeln!(fh, "<html>\n\
                  <head>\n\
                  <title>Choropleth: legends {}</title>\n\
                  </head>\n\
                  <body>",
             env::args().next().unwrap_or_default())?;
    let rdylbu = Scheme::Divergent { low: RGB8::new(0xd7, 0x30, 0x27),
                                     mid: RGB8::new(0xff, 0xff, 0xbf),
                                     high: RGB8::new(0x45, 0x75, 0xb4) };
    let blues = Scheme::Sequential { low: RGB8::new(0xf7, 0xfb, 0xff),
                                     high: RGB8::new(0x08, 0x30, 0x6b) };
    let gray = Scheme::Sequential { low: RGB8::new(0xff, 0xff, 0xff),
                                    high: RGB8::new(0x00, 0x00, 0x80) };

    writeln!(fh, "<h3>Scales</h3>")?;
    scheme(&mut fh, &rdylbu, 11, 43, "red, yellow, blue")?;
    scheme(&mut fh, &rdylbu, 150, 3, "red, yellow, blue")?;
    scheme(&mut fh, &blues, 9, 43, "blues")?;
    scheme(&mut fh, &blues, 150, 3, "blues")?;
    scheme(&mut fh, &gray, 150, 3, "white to navy")?;

    writeln!(fh, "<h3>Legends</h3>")?;
    legend(&mut fh, &rdylbu, Bins::new(75., 125., 11), "dollars", true)?;
    legend(&mut fh, &rdylbu, Bins::new(75., 125., 11), "dollars", false)?;
    legend(&mut fh, &blues, Bins::new(30000., 60000., 7), "thousands", true)?;
    legend(&mut fh, &blues, Bins::new(0.8, 1.2, 5), "percentage", true)?;

    writeln!(fh, "</body>\n\
                  </html>")?;
    Ok(())
}
