use maud::html;

use crate::domain::listing::{AdType, Listing};

fn variant(ad_type: AdType) -> (&'static str, &'static str) {
    match ad_type {
        AdType::Owner => ("🏠", "NOVO PROPRIETÁRIO"),
        AdType::Competitor => ("🏢", "CONCORRÊNCIA"),
    }
}

/// Telegram-HTML text for one listing. maud escapes every scraped string.
pub fn render_listing(listing: &Listing) -> String {
    let (icon, header) = variant(listing.ad_type);
    let site = listing.source_site.as_str().to_uppercase();

    html! {
        (icon) " " b { (header) " (" (site) ")" } "\n\n"
        b { (listing.title) } "\n"
        "💰 " b { (listing.price) } "\n"
        "📍 " (listing.location) "\n\n"
        "🔗 " a href=(listing.url) { "Ver anúncio" }
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::SourceSite;

    fn listing(ad_type: AdType) -> Listing {
        Listing {
            id: "olx-1".into(),
            title: "Casa".into(),
            price: "R$300.000".into(),
            url: "https://x/1".into(),
            category: "Imóvel".into(),
            location: "Centro".into(),
            source_site: SourceSite::Olx,
            ad_type,
        }
    }

    #[test]
    fn owner_variant() {
        let text = render_listing(&listing(AdType::Owner));
        assert_eq!(
            text,
            "🏠 <b>NOVO PROPRIETÁRIO (OLX)</b>\n\n<b>Casa</b>\n💰 <b>R$300.000</b>\n📍 Centro\n\n🔗 <a href=\"https://x/1\">Ver anúncio</a>"
        );
    }

    #[test]
    fn competitor_variant() {
        let mut l = listing(AdType::Competitor);
        l.source_site = SourceSite::Riviera;
        let text = render_listing(&l);
        assert!(text.starts_with("🏢 <b>CONCORRÊNCIA (RIVIERA)</b>"));
    }

    #[test]
    fn escapes_scraped_markup() {
        let mut l = listing(AdType::Owner);
        l.title = "Casa <script> & quintal".into();
        l.url = "https://x/1?a=1&b=\"2\"".into();
        let text = render_listing(&l);
        assert!(text.contains("<b>Casa &lt;script&gt; &amp; quintal</b>"));
        assert!(text.contains("href=\"https://x/1?a=1&amp;b=&quot;2&quot;\""));
    }
}
